//! Environment variable operations.
//!
//! A merged manifest `env {}` map is lowered to an ordered list of
//! operations. Values shaped like `X:${K}` / `${K}:X` against their own
//! key become prepend/append operations so that repeated layers stack
//! instead of clobbering each other.

use std::collections::HashMap;
use std::fmt;

/// A single environment operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Replace the variable outright.
    Set {
        /// Variable name.
        name: String,
        /// New value.
        value: String,
    },
    /// Prepend a `:`-separated element.
    Prepend {
        /// Variable name.
        name: String,
        /// Element to prepend.
        value: String,
    },
    /// Append a `:`-separated element.
    Append {
        /// Variable name.
        name: String,
        /// Element to append.
        value: String,
    },
}

impl Op {
    /// Infer the operation for one `env` entry. `PATH = "x:${PATH}"`
    /// prepends, `PATH = "${PATH}:x"` appends, anything else sets.
    #[must_use]
    pub fn infer(name: &str, value: &str) -> Self {
        let self_ref = format!("${{{name}}}");
        if let Some(head) = value.strip_suffix(&format!(":{self_ref}")) {
            return Self::Prepend {
                name: name.to_string(),
                value: head.to_string(),
            };
        }
        if let Some(tail) = value.strip_prefix(&format!("{self_ref}:")) {
            return Self::Append {
                name: name.to_string(),
                value: tail.to_string(),
            };
        }
        Self::Set {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// The variable this operation targets.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Set { name, .. } | Self::Prepend { name, .. } | Self::Append { name, .. } => name,
        }
    }

    /// The operand value.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Set { value, .. } | Self::Prepend { value, .. } | Self::Append { value, .. } => {
                value
            }
        }
    }

    /// Rewrite the operand value in place.
    pub fn set_value(&mut self, new: String) {
        match self {
            Self::Set { value, .. } | Self::Prepend { value, .. } | Self::Append { value, .. } => {
                *value = new;
            }
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set { name, value } => write!(f, "{name}={value}"),
            Self::Prepend { name, value } => write!(f, "{name}^={value}"),
            Self::Append { name, value } => write!(f, "{name}+={value}"),
        }
    }
}

/// An ordered list of environment operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ops(pub Vec<Op>);

impl Ops {
    /// Apply all operations, in order, to an environment map.
    pub fn apply(&self, env: &mut HashMap<String, String>) {
        for op in &self.0 {
            match op {
                Op::Set { name, value } => {
                    env.insert(name.clone(), value.clone());
                }
                Op::Prepend { name, value } => {
                    let entry = env.entry(name.clone()).or_default();
                    *entry = if entry.is_empty() {
                        value.clone()
                    } else {
                        format!("{value}:{entry}")
                    };
                }
                Op::Append { name, value } => {
                    let entry = env.entry(name.clone()).or_default();
                    *entry = if entry.is_empty() {
                        value.clone()
                    } else {
                        format!("{entry}:{value}")
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference() {
        assert_eq!(
            Op::infer("PATH", "${HERMIT_ENV}/bin:${PATH}"),
            Op::Prepend {
                name: "PATH".to_string(),
                value: "${HERMIT_ENV}/bin".to_string()
            }
        );
        assert_eq!(
            Op::infer("PATH", "${PATH}:${HERMIT_ENV}/bin"),
            Op::Append {
                name: "PATH".to_string(),
                value: "${HERMIT_ENV}/bin".to_string()
            }
        );
        assert_eq!(
            Op::infer("GOROOT", "${root}/go"),
            Op::Set {
                name: "GOROOT".to_string(),
                value: "${root}/go".to_string()
            }
        );
    }

    #[test]
    fn apply_stacks_prepends() {
        let ops = Ops(vec![
            Op::Set {
                name: "PATH".to_string(),
                value: "/usr/bin".to_string(),
            },
            Op::Prepend {
                name: "PATH".to_string(),
                value: "/pkg/a/bin".to_string(),
            },
            Op::Prepend {
                name: "PATH".to_string(),
                value: "/pkg/b/bin".to_string(),
            },
            Op::Append {
                name: "MANPATH".to_string(),
                value: "/pkg/a/man".to_string(),
            },
        ]);
        let mut env = HashMap::new();
        ops.apply(&mut env);
        assert_eq!(env["PATH"], "/pkg/b/bin:/pkg/a/bin:/usr/bin");
        assert_eq!(env["MANPATH"], "/pkg/a/man");
    }
}
