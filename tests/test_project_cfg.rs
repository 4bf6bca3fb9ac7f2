//! End-to-end plan compilation against a project tree on disk

use jarvism_ast::Root;
use jarvism_config::{cfg_file, load_file};

const PROJECT_CFG: &str = r#"
env:
  simulator: vcs
builds:
  build1:
    compile_option: "-full64 -sverilog"
    test_discoverer:
      type: uvm_test
      attr:
        test_dir: build1_testcases
  build2:
    compile_option: -full64
groups:
  nightly:
    build: build1
    args: ["-repeat 2"]
    tests:
      smoke:
      stress:
        args: ["-repeat 1"]
"#;

fn scaffold_project() -> std::path::PathBuf {
    let prj = std::env::temp_dir().join("jvs_e2e_project");
    let cfg_dir = prj.join("jarvism_cfg");
    std::fs::create_dir_all(&cfg_dir).unwrap();
    std::fs::create_dir_all(prj.join("testcases").join("test1")).unwrap();
    std::fs::create_dir_all(prj.join("build1_testcases").join("test2")).unwrap();
    std::fs::create_dir_all(prj.join("work")).unwrap();
    std::fs::write(cfg_dir.join("jarvism_cfg.yaml"), PROJECT_CFG).unwrap();
    std::env::set_var("JVS_PRJ_HOME", &prj);
    prj
}

#[test]
fn test_project_tree_compiles_to_a_plan() {
    let prj = scaffold_project();
    jarvism_plugins::register_all();

    let cfg = load_file(cfg_file().unwrap()).unwrap();
    let root = Root::from_cfg(&cfg).unwrap();

    // discoverers picked up their directories
    let build1 = root.build("build1").unwrap();
    assert_eq!(build1.discoverer().test_list(), vec!["test2".to_string()]);
    let build2 = root.build("build2").unwrap();
    assert_eq!(build2.discoverer().test_list(), vec!["test1".to_string()]);
    assert_eq!(
        build2.discoverer().test_dir(),
        prj.join("testcases")
    );

    // distinct builds carry distinct fingerprints
    assert_ne!(build1.fingerprint(), build2.fingerprint());

    // the group flattens to its two tests, linked and renamed
    let cases = root.collect_test_cases("nightly").unwrap();
    assert_eq!(cases.len(), 2);
    assert!(cases.iter().all(|c| c.name().starts_with("nightly__")));
    assert!(cases
        .iter()
        .all(|c| c.resolved_build.as_deref() == Some("build1")));

    // the model survives a serialize/re-parse round trip
    let reparsed = Root::from_cfg(&root.to_cfg()).unwrap();
    assert_eq!(root.builds, reparsed.builds);
    assert_eq!(root.groups, reparsed.groups);

    // the hierarchical dump names every entity
    let dump = root.hier_string();
    assert!(dump.contains("build1"));
    assert!(dump.contains("nightly"));
}
