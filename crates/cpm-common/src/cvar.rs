// cvar.rs — console variables holding the movement tuning and host settings

use std::collections::HashMap;
use std::path::Path;

use crate::common::{com_dprintf, com_printf, com_set_developer};
use crate::q_shared::{com_tokenize, CVAR_ARCHIVE, CVAR_LATCH, CVAR_NOSET};

/// Nested `exec` limit, guards against configs that exec each other.
const MAX_EXEC_DEPTH: usize = 8;

/// A console variable.
#[derive(Clone, Debug)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub latched_string: Option<String>,
    pub flags: i32,
    pub modified: bool,
    pub value: f32,
}

/// Errors raised while executing configuration text.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The first token of a line is neither a command nor a known cvar.
    UnknownCommand { line: usize, command: String },
    /// A command was given the wrong number of arguments.
    Usage { line: usize, usage: &'static str },
    /// A config file could not be read.
    Io { path: String, message: String },
    /// Configs exec'd each other too deeply.
    ExecDepth(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnknownCommand { line, command } => {
                write!(f, "line {}: unknown command \"{}\"", line, command)
            }
            ConfigError::Usage { line, usage } => write!(f, "line {}: usage: {}", line, usage),
            ConfigError::Io { path, message } => write!(f, "couldn't exec {}: {}", path, message),
            ConfigError::ExecDepth(path) => write!(f, "exec nesting too deep at {}", path),
        }
    }
}

impl std::error::Error for ConfigError {}

/// The full cvar system context.
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
    /// While a movement session runs, CVAR_LATCH variables only latch.
    pub session_active: bool,
}

fn parse_value(s: &str) -> f32 {
    s.trim().parse::<f32>().unwrap_or(0.0)
}

/// Side effects of a value change on specific variables.
fn var_changed(var: &Cvar) {
    if var.name == "developer" {
        com_set_developer(var.value != 0.0);
    }
}

/// `*` matches any run of characters, everything else matches itself.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == name,
        Some((head, tail)) => {
            let Some(rest) = name.strip_prefix(head) else {
                return false;
            };
            if tail.is_empty() {
                return true;
            }
            (0..=rest.len())
                .filter(|&i| rest.is_char_boundary(i))
                .any(|i| wildcard_match(tail, &rest[i..]))
        }
    }
}

impl CvarContext {
    pub fn new() -> Self {
        Self {
            cvar_vars: Vec::new(),
            cvar_index: HashMap::new(),
            session_active: false,
        }
    }

    /// Find a cvar by name, returning its index.
    pub fn find_var_index(&self, name: &str) -> Option<usize> {
        self.cvar_index.get(name).copied()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Get the string value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |var| var.string.as_str())
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in. Returns `None` only when the cvar does not
    /// exist and no value was given.
    pub fn get(&mut self, name: &str, value: Option<&str>, flags: i32) -> Option<usize> {
        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return Some(idx);
        }

        let value = value?;

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            latched_string: None,
            flags,
            modified: true,
            value: parse_value(value),
        });
        self.cvar_index.insert(name.to_string(), idx);
        var_changed(&self.cvar_vars[idx]);

        Some(idx)
    }

    fn set2(&mut self, name: &str, value: &str, force: bool) -> Option<usize> {
        let idx = match self.find_var_index(name) {
            Some(idx) => idx,
            None => return self.get(name, Some(value), 0),
        };

        if !force {
            if self.cvar_vars[idx].flags & CVAR_NOSET != 0 {
                com_printf(&format!("{} is write protected.\n", name));
                return Some(idx);
            }

            if self.cvar_vars[idx].flags & CVAR_LATCH != 0 && self.session_active {
                let var = &mut self.cvar_vars[idx];
                let pending = var.latched_string.as_deref().unwrap_or(&var.string);
                if value == pending {
                    return Some(idx);
                }
                com_printf(&format!("{} will be changed for next session.\n", name));
                var.latched_string = Some(value.to_string());
                return Some(idx);
            }
        }
        self.cvar_vars[idx].latched_string = None;

        let var = &mut self.cvar_vars[idx];
        if value == var.string {
            return Some(idx); // not changed
        }

        var.modified = true;
        var.string = value.to_string();
        var.value = parse_value(value);
        var_changed(var);

        Some(idx)
    }

    /// Set a cvar value (respects NOSET and LATCH flags).
    pub fn set(&mut self, name: &str, value: &str) -> Option<usize> {
        self.set2(name, value, false)
    }

    /// Force-set a cvar value (ignores NOSET and LATCH).
    pub fn force_set(&mut self, name: &str, value: &str) -> Option<usize> {
        self.set2(name, value, true)
    }

    /// Set a cvar with explicit flags.
    pub fn full_set(&mut self, name: &str, value: &str, flags: i32) -> Option<usize> {
        let idx = match self.find_var_index(name) {
            Some(idx) => idx,
            None => return self.get(name, Some(value), flags),
        };

        let var = &mut self.cvar_vars[idx];
        var.modified = true;
        var.string = value.to_string();
        var.value = parse_value(value);
        var.flags = flags;
        var_changed(var);

        Some(idx)
    }

    /// Set a cvar from a float value.
    pub fn set_value(&mut self, name: &str, value: f32) {
        let val_str = if value == (value as i32) as f32 {
            format!("{}", value as i32)
        } else {
            format!("{}", value)
        };
        self.set(name, &val_str);
    }

    /// Apply all latched variable changes. Returns how many were applied.
    pub fn get_latched_vars(&mut self) -> usize {
        let mut applied = 0;
        for var in &mut self.cvar_vars {
            if let Some(latched) = var.latched_string.take() {
                com_dprintf(&format!("{} latched to \"{}\"\n", var.name, latched));
                var.value = parse_value(&latched);
                var.string = latched;
                var.modified = true;
                var_changed(var);
                applied += 1;
            }
        }
        applied
    }

    /// True if any cvar whose name starts with `prefix` changed since the
    /// last call; clears the modified flags it looked at.
    pub fn take_modified(&mut self, prefix: &str) -> bool {
        let mut any = false;
        for var in self.cvar_vars.iter_mut().filter(|v| v.name.starts_with(prefix)) {
            any |= var.modified;
            var.modified = false;
        }
        any
    }

    /// Handle variable inspection/changing from the console.
    /// Returns true if the command was a cvar reference.
    pub fn command(&mut self, argv0: &str, argv1: Option<&str>) -> bool {
        let idx = match self.find_var_index(argv0) {
            Some(idx) => idx,
            None => return false,
        };

        match argv1 {
            None => com_printf(&format!(
                "\"{}\" is \"{}\"\n",
                self.cvar_vars[idx].name, self.cvar_vars[idx].string
            )),
            Some(value) => {
                let name = self.cvar_vars[idx].name.clone();
                self.set(&name, value);
            }
        }
        true
    }

    /// Write all archived cvars to a writer, in a form `exec` reads back.
    pub fn write_variables(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        for var in &self.cvar_vars {
            if var.flags & CVAR_ARCHIVE != 0 {
                let value = var.latched_string.as_deref().unwrap_or(&var.string);
                writeln!(writer, "set {} \"{}\"", var.name, value)?;
            }
        }
        Ok(())
    }

    /// List cvars matching a pattern. Returns (total, matching).
    pub fn list(&self, pattern: Option<&str>) -> (usize, usize) {
        let wc = pattern.unwrap_or("*");
        let mut matching = 0;

        for var in &self.cvar_vars {
            if wildcard_match(wc, &var.name) {
                matching += 1;
                let archive = if var.flags & CVAR_ARCHIVE != 0 { '*' } else { ' ' };
                let noset = if var.flags & CVAR_NOSET != 0 {
                    '-'
                } else if var.flags & CVAR_LATCH != 0 {
                    'L'
                } else {
                    ' '
                };
                com_printf(&format!(
                    "{}{} {} \"{}\"\n",
                    archive, noset, var.name, var.string
                ));
            }
        }

        let total = self.cvar_vars.len();
        com_printf(&format!("{} cvars, {} matching\n", total, matching));
        (total, matching)
    }

    // ============================================================
    // Config execution
    // ============================================================

    /// Execute one tokenized command line. `base` is the directory nested
    /// `exec` paths are resolved against.
    fn execute_tokens(
        &mut self,
        line: usize,
        argv: &[String],
        base: Option<&Path>,
        depth: usize,
    ) -> Result<(), ConfigError> {
        let Some(cmd) = argv.first() else {
            return Ok(());
        };
        let args: Vec<&str> = argv[1..].iter().map(String::as_str).collect();

        match cmd.as_str() {
            "set" | "seta" => {
                if args.len() != 2 {
                    return Err(ConfigError::Usage {
                        line,
                        usage: "set <variable> <value>",
                    });
                }
                let flags = if cmd == "seta" { CVAR_ARCHIVE } else { 0 };
                self.get(args[0], Some(args[1]), flags);
                self.set(args[0], args[1]);
            }
            "unset" => {
                if args.len() != 1 {
                    return Err(ConfigError::Usage {
                        line,
                        usage: "unset <variable>",
                    });
                }
                self.set(args[0], "");
            }
            "cvarlist" => {
                if args.len() > 1 {
                    return Err(ConfigError::Usage {
                        line,
                        usage: "cvarlist [wildcard]",
                    });
                }
                self.list(args.first().copied());
            }
            "exec" => {
                if args.len() != 1 {
                    return Err(ConfigError::Usage {
                        line,
                        usage: "exec <filename>",
                    });
                }
                let path = match base {
                    Some(dir) => dir.join(args[0]),
                    None => Path::new(args[0]).to_path_buf(),
                };
                self.exec_file_depth(&path, depth + 1)?;
            }
            name => {
                if args.len() > 1 || !self.command(name, args.first().copied()) {
                    return Err(ConfigError::UnknownCommand {
                        line,
                        command: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Execute an already split command, such as one taken from argv.
    pub fn execute_argv(&mut self, argv: &[String]) -> Result<(), ConfigError> {
        self.execute_tokens(1, argv, None, 0)
    }

    /// Execute config text line by line. Stops at the first bad line.
    /// Returns the number of commands executed.
    pub fn exec_config_text(&mut self, text: &str) -> Result<usize, ConfigError> {
        self.exec_text_depth(text, None, 0)
    }

    fn exec_text_depth(
        &mut self,
        text: &str,
        base: Option<&Path>,
        depth: usize,
    ) -> Result<usize, ConfigError> {
        let mut executed = 0;
        for (i, line) in text.lines().enumerate() {
            let argv = com_tokenize(line);
            if argv.is_empty() {
                continue;
            }
            self.execute_tokens(i + 1, &argv, base, depth)?;
            executed += 1;
        }
        Ok(executed)
    }

    /// Read and execute a config file.
    pub fn exec_config_file(&mut self, path: &Path) -> Result<usize, ConfigError> {
        self.exec_file_depth(path, 0)
    }

    fn exec_file_depth(&mut self, path: &Path, depth: usize) -> Result<usize, ConfigError> {
        if depth > MAX_EXEC_DEPTH {
            return Err(ConfigError::ExecDepth(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        com_dprintf(&format!("execing {}\n", path.display()));
        self.exec_text_depth(&text, path.parent(), depth)
    }
}

impl Default for CvarContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cvar_get_and_find() {
        let mut ctx = CvarContext::new();
        ctx.get("pm_gravity", Some("20"), 0);
        assert_eq!(ctx.variable_value("pm_gravity"), 20.0);
        assert_eq!(ctx.variable_string("pm_gravity"), "20");
    }

    #[test]
    fn test_cvar_set() {
        let mut ctx = CvarContext::new();
        ctx.get("pm_friction", Some("6"), 0);
        ctx.set("pm_friction", "4");
        assert_eq!(ctx.variable_value("pm_friction"), 4.0);
    }

    #[test]
    fn test_cvar_noset() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", Some("10"), CVAR_NOSET);
        ctx.set("test_var", "20"); // should be blocked
        assert_eq!(ctx.variable_value("test_var"), 10.0);
    }

    #[test]
    fn test_cvar_force_set() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", Some("10"), CVAR_NOSET);
        ctx.force_set("test_var", "20");
        assert_eq!(ctx.variable_value("test_var"), 20.0);
    }

    #[test]
    fn test_cvar_set_value() {
        let mut ctx = CvarContext::new();
        ctx.get("pm_aircontrol", Some("0"), 0);
        ctx.set_value("pm_aircontrol", 0.3);
        assert!((ctx.variable_value("pm_aircontrol") - 0.3).abs() < 0.001);
        ctx.set_value("pm_aircontrol", 2.0);
        assert_eq!(ctx.variable_string("pm_aircontrol"), "2");
    }

    #[test]
    fn test_cvar_full_set_replaces_flags() {
        let mut ctx = CvarContext::new();
        ctx.get("pm_gravity", Some("20"), CVAR_ARCHIVE | CVAR_LATCH);
        ctx.session_active = true;
        ctx.full_set("pm_gravity", "5", CVAR_NOSET);
        assert_eq!(ctx.variable_value("pm_gravity"), 5.0);
        assert_eq!(ctx.find_var("pm_gravity").unwrap().flags, CVAR_NOSET);
    }

    #[test]
    fn test_cvar_not_found() {
        let ctx = CvarContext::new();
        assert_eq!(ctx.variable_value("nonexistent"), 0.0);
        assert_eq!(ctx.variable_string("nonexistent"), "");
    }

    #[test]
    fn test_cvar_get_creates_once() {
        let mut ctx = CvarContext::new();
        ctx.get("test", Some("1"), 0);
        ctx.get("test", Some("2"), CVAR_ARCHIVE); // should NOT change value
        assert_eq!(ctx.variable_string("test"), "1");
        assert_eq!(ctx.find_var("test").unwrap().flags, CVAR_ARCHIVE);
    }

    #[test]
    fn test_cvar_latch_during_session() {
        let mut ctx = CvarContext::new();
        ctx.get("pm_gravity", Some("20"), CVAR_LATCH);
        ctx.session_active = true;
        ctx.set("pm_gravity", "30");
        assert_eq!(ctx.variable_string("pm_gravity"), "20"); // not changed yet
        assert_eq!(ctx.cvar_vars[0].latched_string.as_deref(), Some("30"));
        assert_eq!(ctx.get_latched_vars(), 1);
        assert_eq!(ctx.variable_value("pm_gravity"), 30.0);
    }

    #[test]
    fn test_cvar_latch_outside_session_applies_immediately() {
        let mut ctx = CvarContext::new();
        ctx.get("pm_gravity", Some("20"), CVAR_LATCH);
        ctx.set("pm_gravity", "30");
        assert_eq!(ctx.variable_value("pm_gravity"), 30.0);
        assert_eq!(ctx.get_latched_vars(), 0);
    }

    #[test]
    fn test_take_modified_by_prefix() {
        let mut ctx = CvarContext::new();
        ctx.get("pm_gravity", Some("20"), 0);
        ctx.get("sys_msec", Some("8"), 0);
        assert!(ctx.take_modified("pm_"));
        assert!(!ctx.take_modified("pm_"));
        ctx.set("sys_msec", "16");
        assert!(!ctx.take_modified("pm_"));
        ctx.set("pm_gravity", "21");
        assert!(ctx.take_modified("pm_"));
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*", "pm_gravity"));
        assert!(wildcard_match("pm_*", "pm_gravity"));
        assert!(wildcard_match("pm_*_accel", "pm_air_accel"));
        assert!(!wildcard_match("pm_*_accel", "pm_air_decel"));
        assert!(wildcard_match("developer", "developer"));
        assert!(!wildcard_match("dev", "developer"));
    }

    #[test]
    fn test_exec_config_text() {
        let mut ctx = CvarContext::new();
        ctx.get("pm_gravity", Some("20"), 0);
        let text = "// movement\nset pm_gravity 25\n\nseta pm_jumpforce \"9.5\"\npm_gravity\n";
        let n = ctx.exec_config_text(text).unwrap();
        assert_eq!(n, 3);
        assert_eq!(ctx.variable_value("pm_gravity"), 25.0);
        assert_eq!(ctx.variable_value("pm_jumpforce"), 9.5);
        assert_eq!(ctx.find_var("pm_jumpforce").unwrap().flags & CVAR_ARCHIVE, CVAR_ARCHIVE);
    }

    #[test]
    fn test_exec_bare_cvar_assignment() {
        let mut ctx = CvarContext::new();
        ctx.get("pm_autohop", Some("0"), 0);
        ctx.exec_config_text("pm_autohop 1").unwrap();
        assert_eq!(ctx.variable_value("pm_autohop"), 1.0);
    }

    #[test]
    fn test_exec_unknown_command_reports_line() {
        let mut ctx = CvarContext::new();
        let err = ctx.exec_config_text("set a 1\nbind space +jump\n").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownCommand {
                line: 2,
                command: "bind".to_string()
            }
        );
        // the first line still ran
        assert_eq!(ctx.variable_value("a"), 1.0);
    }

    #[test]
    fn test_exec_set_usage() {
        let mut ctx = CvarContext::new();
        let err = ctx.exec_config_text("set pm_gravity").unwrap_err();
        assert!(matches!(err, ConfigError::Usage { line: 1, .. }));
    }

    #[test]
    fn test_exec_missing_file() {
        let mut ctx = CvarContext::new();
        let err = ctx
            .exec_config_file(Path::new("/nonexistent/dir/movement.cfg"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }), "got {:?}", err);
    }

    #[test]
    fn test_write_variables_round_trips_through_exec() {
        let mut ctx = CvarContext::new();
        ctx.get("pm_gravity", Some("25"), CVAR_ARCHIVE);
        ctx.get("scratch", Some("1"), 0);
        let mut out = Vec::new();
        ctx.write_variables(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "set pm_gravity \"25\"\n");

        let mut other = CvarContext::new();
        other.exec_config_text(&text).unwrap();
        assert_eq!(other.variable_value("pm_gravity"), 25.0);
    }

    #[test]
    fn test_execute_argv_passes_arguments_verbatim() {
        let mut ctx = CvarContext::new();
        let argv: Vec<String> = ["set", "sys_writeconfig", "my \"best\" run.cfg"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        ctx.execute_argv(&argv).unwrap();
        assert_eq!(ctx.variable_string("sys_writeconfig"), "my \"best\" run.cfg");
    }

    #[test]
    fn test_exec_unset_clears_value() {
        let mut ctx = CvarContext::new();
        ctx.get("sys_writeconfig", Some("movement.cfg"), 0);
        assert_eq!(ctx.exec_config_text("unset sys_writeconfig").unwrap(), 1);
        assert_eq!(ctx.variable_string("sys_writeconfig"), "");
        assert_eq!(ctx.variable_value("sys_writeconfig"), 0.0);
    }

    #[test]
    fn test_cvarlist_counts_matches() {
        let mut ctx = CvarContext::new();
        ctx.get("pm_gravity", Some("20"), CVAR_ARCHIVE);
        ctx.get("pm_friction", Some("6"), CVAR_ARCHIVE);
        ctx.get("developer", Some("0"), 0);
        assert_eq!(ctx.list(Some("pm_*")), (3, 2));
        assert_eq!(ctx.list(None), (3, 3));
        assert_eq!(ctx.list(Some("sv_*")), (3, 0));
        assert_eq!(ctx.exec_config_text("cvarlist pm_*").unwrap(), 1);
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("cpm_cvar_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_nested_exec_is_relative_to_including_file() {
        let dir = scratch_dir("nested");
        std::fs::write(dir.join("a.cfg"), "set pm_gravity 25\nexec b.cfg\n").unwrap();
        std::fs::write(dir.join("b.cfg"), "set pm_jumpforce 9\n").unwrap();

        let mut ctx = CvarContext::new();
        let result = ctx.exec_config_file(&dir.join("a.cfg"));
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(result.unwrap(), 2);
        assert_eq!(ctx.variable_value("pm_gravity"), 25.0);
        assert_eq!(ctx.variable_value("pm_jumpforce"), 9.0);
    }

    #[test]
    fn test_self_exec_stops_at_depth_limit() {
        let dir = scratch_dir("loop");
        std::fs::write(dir.join("loop.cfg"), "set pm_gravity 25\nexec loop.cfg\n").unwrap();

        let mut ctx = CvarContext::new();
        let result = ctx.exec_config_file(&dir.join("loop.cfg"));
        std::fs::remove_dir_all(&dir).ok();

        assert!(matches!(result, Err(ConfigError::ExecDepth(_))), "got {:?}", result);
        assert_eq!(ctx.variable_value("pm_gravity"), 25.0);
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::Usage {
            line: 3,
            usage: "unset <variable>",
        };
        assert_eq!(err.to_string(), "line 3: usage: unset <variable>");
    }
}
