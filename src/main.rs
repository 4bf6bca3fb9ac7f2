use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use jarvism_ast::Root;
use jarvism_runtime::{
    run_group, run_only_build, run_test, spawn_signal_handler, CancelToken, RunSummary,
};
use std::path::PathBuf;
use tracing::info;

/// jarvism - hardware-simulation test regression driver
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
#[command(rename_all = "snake_case")]
enum Commands {
    /// Run every test of a configured group
    Run {
        /// Group name
        group: String,

        /// Option fragments forwarded to the plan, e.g. "-repeat 10"
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run one test against a build
    RunTest {
        /// Test name
        test: String,

        /// Build name
        build: String,

        /// Option fragments forwarded to the plan
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Compile a build without running any test
    RunBuild {
        /// Build name
        build: String,

        /// Option fragments forwarded to the plan
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List the tests a build can discover
    ShowTests {
        /// Build name
        build: String,
    },

    /// Dump the linked configuration
    ShowCfg,

    /// Create a jarvism default project
    Init {
        /// Project directory, default is the current directory
        #[arg(long)]
        prj_dir: Option<PathBuf>,

        /// Working directory, default is <prj_dir>/work
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    jarvism_plugins::register_all();

    match cli.command {
        Commands::Run { group, args } => {
            let mut root = load_root()?;
            let summary = with_signals(|cancel| async move {
                run_group(&mut root, &group, &args, cancel).await
            })
            .await?;
            finish(summary);
        }

        Commands::RunTest { test, build, args } => {
            let mut root = load_root()?;
            let summary = with_signals(|cancel| async move {
                run_test(&mut root, &test, &build, &args, cancel).await
            })
            .await?;
            finish(summary);
        }

        Commands::RunBuild { build, args } => {
            let mut root = load_root()?;
            let summary = with_signals(|cancel| async move {
                run_only_build(&mut root, &build, &args, cancel).await
            })
            .await?;
            finish(summary);
        }

        Commands::ShowTests { build } => {
            let root = load_root()?;
            show_tests(&root, &build)?;
        }

        Commands::ShowCfg => {
            let root = load_root()?;
            println!("{}", root.hier_string());
        }

        Commands::Init { prj_dir, work_dir } => {
            init_project(prj_dir, work_dir)?;
        }
    }

    Ok(())
}

fn load_root() -> Result<Root> {
    jarvism_config::check_env()?;
    let cfg_file = jarvism_config::cfg_file()?;
    let cfg = jarvism_config::load_file(&cfg_file)
        .with_context(|| format!("loading {}", cfg_file.display()))?;
    let root = Root::from_cfg(&cfg).context("parsing project configuration")?;
    Ok(root)
}

async fn with_signals<F, Fut>(run: F) -> Result<RunSummary>
where
    F: FnOnce(CancelToken) -> Fut,
    Fut: std::future::Future<Output = jarvism_runtime::Result<RunSummary>>,
{
    let cancel = CancelToken::new();
    let listener = spawn_signal_handler(cancel.clone());
    let summary = run(cancel.clone()).await?;
    cancel.cancel();
    let _ = listener.await;
    Ok(summary)
}

fn finish(summary: RunSummary) -> ! {
    println!("{}", summary.render());
    std::process::exit(if summary.has_fail() { 1 } else { 0 });
}

fn show_tests(root: &Root, build_name: &str) -> Result<()> {
    let Some(build) = root.build(build_name) else {
        bail!("build {} is undef!", build_name);
    };
    let discoverer = build.discoverer();
    println!(
        "tests of build {} ({}):",
        build_name,
        discoverer.test_dir().display()
    );
    for test in discoverer.test_list() {
        println!("  {}", test);
    }
    Ok(())
}

/// Scaffold a default project:
///
/// ```text
/// <prj_dir>
/// |-- jarvism_cfg
/// |   |-- jarvism_cfg.yaml
/// |   `-- jarvism_setup.sh
/// |-- src
/// `-- testcases
/// <work_dir>
/// ```
fn init_project(prj_dir: Option<PathBuf>, work_dir: Option<PathBuf>) -> Result<()> {
    let prj_dir = match prj_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("resolving current directory")?,
    };
    let work_dir = work_dir.unwrap_or_else(|| prj_dir.join("work"));

    for dir in [
        prj_dir.clone(),
        work_dir.clone(),
        prj_dir.join("jarvism_cfg"),
        prj_dir.join("src"),
        prj_dir.join("testcases"),
    ] {
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let setup = format!(
        "#!/bin/bash\nexport JVS_PRJ_HOME={}\nexport JVS_WORK_DIR={}\n",
        prj_dir.display(),
        work_dir.display()
    );
    let setup_path = prj_dir.join("jarvism_cfg").join("jarvism_setup.sh");
    std::fs::write(&setup_path, setup)
        .with_context(|| format!("writing {}", setup_path.display()))?;

    let cfg_path = prj_dir.join("jarvism_cfg").join("jarvism_cfg.yaml");
    std::fs::write(&cfg_path, "builds:\n  build1:\n")
        .with_context(|| format!("writing {}", cfg_path.display()))?;

    info!("created project at {}", prj_dir.display());
    Ok(())
}
