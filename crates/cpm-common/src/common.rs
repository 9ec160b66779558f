// common.rs — console printing, fatal errors and argument handling

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

pub const MAX_NUM_ARGVS: usize = 50;

/// Distribution name and version (for banners and version strings).
pub const DISTNAME: &str = "cpm-move";
pub const DISTVER: f32 = 1.0;

pub const ERR_FATAL: i32 = 0;
pub const ERR_DROP: i32 = 1;
pub const ERR_QUIT: i32 = 2;

// ============================================================
// Redirect buffer for Com_Printf
// ============================================================

static RD_BUFFER: Mutex<Option<String>> = parking_lot::const_mutex(None);

/// Begin redirecting printf output into a buffer.
pub fn com_begin_redirect() {
    *RD_BUFFER.lock() = Some(String::new());
}

/// End redirect and return the captured output.
pub fn com_end_redirect() -> Option<String> {
    RD_BUFFER.lock().take()
}

// ============================================================
// Com_Printf / Com_DPrintf / Com_Error
// ============================================================

/// General-purpose print function. Prints to stdout, or appends to the
/// redirect buffer if one is active.
pub fn com_printf(msg: &str) {
    {
        let mut buf = RD_BUFFER.lock();
        if let Some(ref mut s) = *buf {
            s.push_str(msg);
            return;
        }
    }
    print!("{}", msg);
}

/// Mirrors the "developer" cvar; kept up to date by the cvar system.
static DEVELOPER: AtomicBool = AtomicBool::new(false);

pub fn com_set_developer(enabled: bool) {
    DEVELOPER.store(enabled, Ordering::Relaxed);
}

/// Developer-only print, controlled by the "developer" cvar.
pub fn com_dprintf(msg: &str) {
    if !DEVELOPER.load(Ordering::Relaxed) {
        return;
    }
    com_printf(msg);
}

/// Host error handler.
/// - `ERR_FATAL`: prints to stderr and panics.
/// - `ERR_DROP`: prints the error and returns.
/// - `ERR_QUIT`: clean exit.
pub fn com_error(code: i32, msg: &str) {
    if code == ERR_FATAL {
        eprintln!("Error: {}", msg);
        panic!("Fatal error: {}", msg);
    } else if code == ERR_DROP {
        eprintln!("********************\nERROR: {}\n********************", msg);
    } else {
        println!("{}", msg);
        std::process::exit(0);
    }
}

// ============================================================
// COM argument handling
// ============================================================

pub struct ComArgs {
    pub argc: usize,
    pub argv: Vec<String>,
}

impl ComArgs {
    pub fn new() -> Self {
        Self {
            argc: 0,
            argv: Vec::new(),
        }
    }

    pub fn init(&mut self, args: &[String]) {
        self.argc = args.len().min(MAX_NUM_ARGVS);
        self.argv = args[..self.argc].to_vec();
    }

    pub fn com_argc(&self) -> usize {
        self.argc
    }

    pub fn com_argv(&self, arg: usize) -> &str {
        if arg >= self.argc {
            ""
        } else {
            &self.argv[arg]
        }
    }

    pub fn com_clear_argv(&mut self, arg: usize) {
        if arg < self.argc {
            self.argv[arg] = String::new();
        }
    }

    /// Collect the `+command arg arg` groups as argument vectors, in order.
    /// Arguments are passed through untouched, never re-tokenized. Every
    /// argument consumed this way is cleared, leaving the positional ones
    /// behind.
    pub fn take_plus_commands(&mut self) -> Vec<Vec<String>> {
        let mut commands = Vec::new();
        let mut i = 1;
        while i < self.argc {
            let Some(cmd) = self.argv[i].strip_prefix('+').map(str::to_string) else {
                i += 1;
                continue;
            };
            self.com_clear_argv(i);
            let mut argv = vec![cmd];
            i += 1;
            while i < self.argc && !self.argv[i].starts_with('+') {
                argv.push(std::mem::take(&mut self.argv[i]));
                i += 1;
            }
            commands.push(argv);
        }
        commands
    }

    /// Positional arguments left after `take_plus_commands`.
    pub fn positional(&self) -> Vec<&str> {
        self.argv
            .iter()
            .skip(1)
            .filter(|a| !a.is_empty())
            .map(String::as_str)
            .collect()
    }
}

impl Default for ComArgs {
    fn default() -> Self {
        Self::new()
    }
}
