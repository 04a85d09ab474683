// cvar.rs -- dynamic variable tracking

use crate::common::{com_dprintf, com_printf};
use crate::q_shared::{CvarFlags, CVAR_LATCH, CVAR_NOSET};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// A console variable.
#[derive(Clone, Debug)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub reset_string: String,
    pub latched_string: Option<String>,
    pub flags: CvarFlags,
    pub modified: bool,
    /// Incremented on every effective change. Consumers cache the count they
    /// last saw and compare it instead of the value.
    pub modification_count: u32,
    pub value: f32,
    pub integer: i32,
}

impl Cvar {
    fn assign(&mut self, value: &str) {
        self.string = value.to_string();
        self.value = parse_value(value);
        self.integer = parse_integer(value);
        self.modified = true;
        self.modification_count = self.modification_count.wrapping_add(1);
    }
}

/// Index of a registered cvar. Stable for the lifetime of the context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CvarHandle(pub usize);

/// Cvar table shared between the console owner and the render thread.
pub type SharedCvars = Arc<RwLock<CvarContext>>;

fn parse_value(s: &str) -> f32 {
    s.trim().parse::<f32>().unwrap_or(0.0)
}

/// atoi semantics: leading integer part, 0 when there is none.
fn parse_integer(s: &str) -> i32 {
    let s = s.trim();
    if let Ok(i) = s.parse::<i32>() {
        return i;
    }
    let end = s
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    s[..end].parse::<i32>().unwrap_or(0)
}

/// The full cvar system context.
#[derive(Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh context for sharing across threads.
    pub fn shared() -> SharedCvars {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Find a cvar by name. O(1) via HashMap.
    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Look up a cvar by the handle returned from `get`.
    pub fn cvar(&self, handle: CvarHandle) -> &Cvar {
        &self.cvar_vars[handle.0]
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        match self.find_var(name) {
            Some(var) => var.value,
            None => 0.0,
        }
    }

    /// Get the integer value of a cvar. Returns 0 if not found.
    pub fn variable_integer(&self, name: &str) -> i32 {
        self.find_var(name).map_or(0, |var| var.integer)
    }

    /// Get the string value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        match self.find_var(name) {
            Some(var) => &var.string,
            None => "",
        }
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in.
    pub fn get(&mut self, name: &str, value: &str, flags: CvarFlags) -> Option<CvarHandle> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            com_printf(&format!("invalid cvar name \"{}\"\n", name));
            return None;
        }

        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return Some(CvarHandle(idx));
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            reset_string: value.to_string(),
            latched_string: None,
            flags,
            modified: true,
            modification_count: 1,
            value: parse_value(value),
            integer: parse_integer(value),
        });
        self.cvar_index.insert(name.to_string(), idx);

        Some(CvarHandle(idx))
    }

    /// Internal set implementation.
    fn set2(&mut self, name: &str, value: &str, force: bool) -> Option<CvarHandle> {
        let idx = match self.cvar_index.get(name).copied() {
            Some(idx) => idx,
            None => return self.get(name, value, CvarFlags::empty()),
        };

        let var = &mut self.cvar_vars[idx];

        if !force {
            if var.flags.contains(CVAR_NOSET) {
                com_printf(&format!("{} is write protected.\n", name));
                return Some(CvarHandle(idx));
            }

            if var.flags.contains(CVAR_LATCH) {
                match var.latched_string {
                    Some(ref latched) if value == latched => return Some(CvarHandle(idx)),
                    None if value == var.string => return Some(CvarHandle(idx)),
                    _ => {}
                }
                com_printf(&format!("{} will be changed upon restarting.\n", name));
                var.latched_string = Some(value.to_string());
                return Some(CvarHandle(idx));
            }
        } else {
            var.latched_string = None;
        }

        if value == var.string {
            return Some(CvarHandle(idx)); // not changed
        }

        com_dprintf(&format!("cvar \"{}\" = \"{}\"\n", name, value));
        var.assign(value);

        Some(CvarHandle(idx))
    }

    /// Set a cvar value (respects NOSET and LATCH flags).
    pub fn set(&mut self, name: &str, value: &str) -> Option<CvarHandle> {
        self.set2(name, value, false)
    }

    /// Force-set a cvar value (ignores NOSET and LATCH).
    pub fn force_set(&mut self, name: &str, value: &str) -> Option<CvarHandle> {
        self.set2(name, value, true)
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

    /// Restore the value the cvar was registered with.
    pub fn reset(&mut self, name: &str) {
        if let Some(reset) = self.find_var(name).map(|v| v.reset_string.clone()) {
            self.set(name, &reset);
        }
    }

    /// Apply all latched variable changes.
    pub fn get_latched_vars(&mut self) {
        for var in &mut self.cvar_vars {
            if let Some(latched) = var.latched_string.take() {
                var.assign(&latched);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::q_shared::CVAR_ZERO;

    #[test]
    fn test_cvar_get_and_find() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "42", CVAR_ZERO);
        assert_eq!(ctx.variable_value("test_var"), 42.0);
        assert_eq!(ctx.variable_integer("test_var"), 42);
        assert_eq!(ctx.variable_string("test_var"), "42");
    }

    #[test]
    fn test_cvar_set() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "10", CVAR_ZERO);
        ctx.set("test_var", "20");
        assert_eq!(ctx.variable_value("test_var"), 20.0);
    }

    #[test]
    fn test_cvar_noset() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "10", CVAR_NOSET);
        ctx.set("test_var", "20"); // should be blocked
        assert_eq!(ctx.variable_value("test_var"), 10.0);
    }

    #[test]
    fn test_cvar_force_set() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "10", CVAR_NOSET);
        ctx.force_set("test_var", "20");
        assert_eq!(ctx.variable_value("test_var"), 20.0);
    }

    #[test]
    fn test_cvar_set_value() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "0", CVAR_ZERO);
        ctx.set_value("test_var", 1.5);
        assert_eq!(ctx.variable_string("test_var"), "1.5");
        assert_eq!(ctx.variable_integer("test_var"), 1);
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
        let a = ctx.get("test", "1", CVAR_ZERO);
        let b = ctx.get("test", "2", CVAR_ZERO); // should NOT change value
        assert_eq!(a, b);
        assert_eq!(ctx.variable_string("test"), "1");
    }

    #[test]
    fn test_cvar_latch() {
        let mut ctx = CvarContext::new();
        ctx.get("r_mode", "3", CVAR_LATCH);
        ctx.set("r_mode", "4");
        assert_eq!(ctx.variable_string("r_mode"), "3"); // not changed yet
        assert_eq!(ctx.cvar_vars[0].latched_string.as_deref(), Some("4"));
        ctx.get_latched_vars();
        assert_eq!(ctx.variable_string("r_mode"), "4");
    }

    // ========================================================================
    // Modification counts
    // ========================================================================

    #[test]
    fn test_modification_count_bumps_on_change_only() {
        let mut ctx = CvarContext::new();
        let h = ctx.get("r_resolutionScale", "1", CVAR_ZERO).unwrap();
        let start = ctx.cvar(h).modification_count;
        ctx.set("r_resolutionScale", "1");
        assert_eq!(ctx.cvar(h).modification_count, start);
        ctx.set("r_resolutionScale", "1.5");
        assert_eq!(ctx.cvar(h).modification_count, start + 1);
    }

    #[test]
    fn test_modification_count_bumps_on_latch_apply() {
        let mut ctx = CvarContext::new();
        let h = ctx.get("r_mode", "3", CVAR_LATCH).unwrap();
        let start = ctx.cvar(h).modification_count;
        ctx.set("r_mode", "5");
        assert_eq!(ctx.cvar(h).modification_count, start);
        ctx.get_latched_vars();
        assert_eq!(ctx.cvar(h).modification_count, start + 1);
    }

    #[test]
    fn test_integer_parses_like_atoi() {
        assert_eq!(parse_integer("2.5"), 2);
        assert_eq!(parse_integer("-1"), -1);
        assert_eq!(parse_integer("abc"), 0);
        assert_eq!(parse_integer(" 7 "), 7);
    }

    #[test]
    fn test_reset_restores_default() {
        let mut ctx = CvarContext::new();
        ctx.get("r_fastSky", "0", CVAR_ZERO);
        ctx.set("r_fastSky", "1");
        ctx.reset("r_fastSky");
        assert_eq!(ctx.variable_integer("r_fastSky"), 0);
    }

    #[test]
    fn test_shared_context() {
        let shared = CvarContext::shared();
        shared.write().get("r_finish", "0", CVAR_ZERO);
        assert_eq!(shared.read().variable_integer("r_finish"), 0);
    }
}
