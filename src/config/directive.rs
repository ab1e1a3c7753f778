//! Unit directives and their argument-count rules.
//!
//! Each key of a unit declaration is applied as a directive carrying a list
//! of tokens, e.g. `cmd python3 -m http.server 4080` or `noop`.

use crate::error::{AppdError, Result};
use crate::service::Unit;
use std::path::PathBuf;

/// Minimum and maximum number of tokens a directive accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgRule {
    /// Minimum token count.
    pub min: usize,
    /// Maximum token count.
    pub max: usize,
}

const fn rule(min: usize, max: usize) -> ArgRule {
    ArgRule { min, max }
}

/// Returns the rule for a directive, or `None` for unknown keys.
pub fn arg_rule(key: &str) -> Option<ArgRule> {
    let rule = match key {
        "cmd" | "args" | "before" | "after" | "description" => rule(1, 255),
        "workdir" | "stdout" | "stderr" | "priority" => rule(1, 1),
        "noop" => rule(0, 0),
        _ => return None,
    };
    Some(rule)
}

fn validate_arg(key: &str, values: &[String]) -> Result<()> {
    let rule = arg_rule(key).ok_or_else(|| AppdError::UnsupportedKey {
        key: key.to_string(),
    })?;
    if values.len() < rule.min {
        return Err(AppdError::TooFewArgs {
            directive: key.to_string(),
        });
    }
    if values.len() > rule.max {
        return Err(AppdError::TooManyArgs {
            directive: key.to_string(),
        });
    }
    Ok(())
}

/// Applies one directive to a unit.
pub fn apply_directive(unit: &mut Unit, key: &str, values: &[String]) -> Result<()> {
    validate_arg(key, values)?;

    match key {
        "cmd" => {
            unit.command = values[0].clone();
            unit.arguments.extend_from_slice(&values[1..]);
        }
        "args" => unit.arguments.extend_from_slice(values),
        "noop" => unit.noop = true,
        "workdir" => unit.work_directory = Some(PathBuf::from(&values[0])),
        "stdout" => unit.std_out_file_path = Some(PathBuf::from(&values[0])),
        "stderr" => unit.std_err_file_path = Some(PathBuf::from(&values[0])),
        "priority" => {
            unit.priority = values[0].parse().map_err(|_| AppdError::InvalidValue {
                directive: key.to_string(),
                value: values[0].clone(),
            })?;
        }
        "before" => unit.before.extend_from_slice(values),
        "after" => unit.after.extend_from_slice(values),
        "description" => unit.description = Some(values.join(" ")),
        _ => {
            return Err(AppdError::UnsupportedKey {
                key: key.to_string(),
            })
        }
    }
    Ok(())
}
