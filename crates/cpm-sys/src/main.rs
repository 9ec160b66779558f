// Entry point — headless movement simulator
//
//   cpm-move [scenario|all|sweep] [+set name value] [+exec file.cfg]
//
// 1. Register cvars and run the +commands from the command line
// 2. Build movement parameters from the cvars
// 3. Run the requested scenarios and print a report per scenario
// 4. Write archived cvars to sys_writeconfig, if set

use cpm_common::common::{com_error, com_printf, ComArgs, DISTNAME, DISTVER, ERR_FATAL};
use cpm_common::cvar::CvarContext;
use cpm_common::pmove::{pm_register_cvars, PmoveParams};
use cpm_sys::sv_bots::Scenario;
use cpm_sys::sys_frame::{
    format_report, run_scenario, sys_register_cvars, sys_sweep, sys_write_config, SimConfig,
};

const SWEEP_AIR_CONTROL: [f32; 5] = [0.0, 0.3, 1.0, 2.0, 4.0];

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let mut com_args = ComArgs::new();
    com_args.init(&args);

    let mut cvars = CvarContext::new();
    cvars.get("developer", Some("0"), 0);
    pm_register_cvars(&mut cvars);
    sys_register_cvars(&mut cvars);

    for argv in com_args.take_plus_commands() {
        if let Err(e) = cvars.execute_argv(&argv) {
            com_error(ERR_FATAL, &e.to_string());
            return;
        }
    }

    // from here on, movement tuning changes wait for the next run
    cvars.session_active = true;

    let params = match PmoveParams::from_cvars(&cvars) {
        Ok(params) => params,
        Err(e) => {
            com_error(ERR_FATAL, &e.to_string());
            return;
        }
    };
    let config = SimConfig::from_cvars(&cvars);

    com_printf(&format!("{} {:.2}\n", DISTNAME, DISTVER));

    let what = com_args.positional().first().copied().unwrap_or("all");
    match what {
        "sweep" => {
            let mut current = None;
            for result in sys_sweep(&mut cvars, &config, &SWEEP_AIR_CONTROL) {
                if current != Some(result.air_control) {
                    com_printf(&format!("pm_aircontrol {}\n", result.air_control));
                    current = Some(result.air_control);
                }
                match result.report {
                    Ok(report) => com_printf(&format!("  {}", format_report(&report))),
                    Err(e) => com_printf(&format!("  {}\n", e)),
                }
            }
        }
        "all" => {
            for scenario in Scenario::ALL {
                run_one(scenario, &params, &config);
            }
        }
        name => match Scenario::from_name(name) {
            Some(scenario) => run_one(scenario, &params, &config),
            None => com_error(ERR_FATAL, &format!("unknown scenario \"{}\"", name)),
        },
    }

    let path = cvars.variable_string("sys_writeconfig").to_string();
    if !path.is_empty() {
        match sys_write_config(&cvars, std::path::Path::new(&path)) {
            Ok(()) => com_printf(&format!("wrote {}\n", path)),
            Err(e) => com_printf(&format!("couldn't write {}: {}\n", path, e)),
        }
    }
}

fn run_one(scenario: Scenario, params: &PmoveParams, config: &SimConfig) {
    match run_scenario(scenario, params, config) {
        Ok(report) => com_printf(&format_report(&report)),
        Err(e) => com_error(ERR_FATAL, &e.to_string()),
    }
}
