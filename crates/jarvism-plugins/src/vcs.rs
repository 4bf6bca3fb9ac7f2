//! VCS simulator adapter

use jarvism_ast::Simulator;

/// Synopsys VCS: `vcs` compiles, the produced `simv` simulates
pub struct Vcs;

impl Simulator for Vcs {
    fn name(&self) -> &'static str {
        "vcs"
    }

    fn builtin_options(&self) -> &'static str {
        include_str!("../options/vcs_options.yaml")
    }

    fn compile_cmd(&self) -> &'static str {
        "vcs"
    }

    fn sim_cmd(&self) -> &'static str {
        "simv"
    }

    fn seed_option(&self) -> &'static str {
        "+ntb_random_seed="
    }
}
