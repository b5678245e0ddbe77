use std::time::Duration;

use super::{Arg, CommandSpec, Placeholder, Program};

/// The allowlist. Fixed at compile time.
pub static CATALOGUE: [CommandSpec; 9] = [
    CommandSpec {
        id: "check_config",
        program: Program::UnboundCheckconf,
        args: &[],
        timeout: Duration::from_secs(15),
        allow_non_zero_exit: false,
    },
    CommandSpec {
        id: "check_config_file",
        program: Program::UnboundCheckconf,
        args: &[Arg::Param(Placeholder::Path)],
        timeout: Duration::from_secs(15),
        allow_non_zero_exit: false,
    },
    CommandSpec {
        id: "reload",
        program: Program::UnboundControl,
        args: &[Arg::Lit("reload")],
        timeout: Duration::from_secs(15),
        allow_non_zero_exit: false,
    },
    CommandSpec {
        id: "resolver_status",
        program: Program::UnboundControl,
        args: &[Arg::Lit("status")],
        timeout: Duration::from_secs(5),
        allow_non_zero_exit: true,
    },
    CommandSpec {
        id: "stats",
        program: Program::UnboundControl,
        args: &[Arg::Lit("stats_noreset")],
        timeout: Duration::from_secs(10),
        allow_non_zero_exit: false,
    },
    CommandSpec {
        id: "flush_zone",
        program: Program::UnboundControl,
        args: &[Arg::Lit("flush_zone"), Arg::Param(Placeholder::Zone)],
        timeout: Duration::from_secs(10),
        allow_non_zero_exit: false,
    },
    CommandSpec {
        id: "flush_infra",
        program: Program::UnboundControl,
        args: &[Arg::Lit("flush_infra"), Arg::Lit("all")],
        timeout: Duration::from_secs(10),
        allow_non_zero_exit: false,
    },
    CommandSpec {
        id: "service_status",
        program: Program::Systemctl,
        args: &[Arg::Lit("is-active"), Arg::Param(Placeholder::Service)],
        timeout: Duration::from_secs(5),
        allow_non_zero_exit: true,
    },
    CommandSpec {
        id: "restart_service",
        program: Program::Systemctl,
        args: &[Arg::Lit("restart"), Arg::Param(Placeholder::Service)],
        timeout: Duration::from_secs(30),
        allow_non_zero_exit: false,
    },
];

pub fn find_spec(id: &str) -> Option<&'static CommandSpec> {
    CATALOGUE.iter().find(|spec| spec.id == id)
}
