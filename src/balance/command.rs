//! Load-balancing command line.
//!
//! `<mode> [params...]`, where `mode` is `0..=6` and may carry `+100` to
//! enable verbose transfer statistics for the duration of the call.
//!
//! | mode | strategy          | parameters              |
//! |------|-------------------|-------------------------|
//! | 0    | RCB on one level  | `[level=0]`             |
//! | 1    | collect to master | `[from=0 [to=top]]`     |
//! | 2    | segment collect   | `part dest [level=0]`   |
//! | 3    | full assign       | `[dest=coordinator]`    |
//! | 4    | structured DD     | `hor vert [depth]`      |
//! | 5    | RCB level range   | `from to`               |
//! | 6    | agglomerate       |                         |

use crate::mesh_error::MeshDistribError;
use crate::partitioning::structured::BoxShape;
use crate::topology::context::ProcessContext;
use crate::topology::multigrid::Rank;
use std::fmt;
use std::str::FromStr;

/// Mode offset that switches on verbose transfer statistics.
pub const VERBOSE_OFFSET: i64 = 100;

/// One balancing strategy with its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LbStrategy {
    /// Mode 0.
    Rcb { level: usize },
    /// Mode 1; `to == None` means the top level.
    CollectToMaster { from: usize, to: Option<usize> },
    /// Mode 2.
    SegmentCollect { part: u32, dest: Rank, level: usize },
    /// Mode 3; `dest == None` means the coordinator.
    FullAssign { dest: Option<Rank> },
    /// Mode 4.
    Structured(BoxShape),
    /// Mode 5.
    RcbRange { from: usize, to: usize },
    /// Mode 6.
    Agglomerate,
}

impl LbStrategy {
    pub fn mode(&self) -> u32 {
        match self {
            LbStrategy::Rcb { .. } => 0,
            LbStrategy::CollectToMaster { .. } => 1,
            LbStrategy::SegmentCollect { .. } => 2,
            LbStrategy::FullAssign { .. } => 3,
            LbStrategy::Structured(_) => 4,
            LbStrategy::RcbRange { .. } => 5,
            LbStrategy::Agglomerate => 6,
        }
    }

    /// Whether the strategy finishes with a transfer from some level.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LbStrategy::Agglomerate)
    }
}

/// A parsed load-balancing command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LbCommand {
    pub strategy: LbStrategy,
    /// Verbose transfer statistics for this call.
    pub verbose: bool,
}

impl LbCommand {
    pub fn new(strategy: LbStrategy) -> Self {
        Self {
            strategy,
            verbose: false,
        }
    }

    pub fn verbose(mut self, on: bool) -> Self {
        self.verbose = on;
        self
    }

    /// Parse one command line.
    pub fn parse(line: &str) -> Result<Self, MeshDistribError> {
        let mut tokens = line.split_whitespace();
        let first = tokens.next().ok_or(MeshDistribError::EmptyCommand)?;
        let raw: i64 = first
            .parse()
            .map_err(|_| MeshDistribError::InvalidParameter(first.to_string()))?;
        let (mode, verbose) = if raw >= VERBOSE_OFFSET {
            (raw - VERBOSE_OFFSET, true)
        } else {
            (raw, false)
        };
        let params = tokens.map(parse_param).collect::<Result<Vec<_>, _>>()?;
        let mut args = Params {
            mode: u32::try_from(mode).map_err(|_| MeshDistribError::UnknownMode(raw))?,
            values: &params,
            next: 0,
        };

        let strategy = match mode {
            0 => LbStrategy::Rcb {
                level: args.optional().unwrap_or(0),
            },
            1 => LbStrategy::CollectToMaster {
                from: args.optional().unwrap_or(0),
                to: args.optional(),
            },
            2 => {
                let part = args.required("part")?;
                let part = u32::try_from(part)
                    .map_err(|_| MeshDistribError::InvalidParameter(part.to_string()))?;
                LbStrategy::SegmentCollect {
                    part,
                    dest: args.required("dest")?,
                    level: args.optional().unwrap_or(0),
                }
            }
            3 => LbStrategy::FullAssign {
                dest: args.optional(),
            },
            4 => {
                let hor = args.required("hor")?;
                let vert = args.required("vert")?;
                let depth = args.optional().unwrap_or(1);
                if hor == 0 || vert == 0 || depth == 0 {
                    return Err(MeshDistribError::InvalidParameter(format!(
                        "{hor}x{vert}x{depth}"
                    )));
                }
                LbStrategy::Structured(BoxShape::new3(hor, vert, depth))
            }
            5 => LbStrategy::RcbRange {
                from: args.required("from")?,
                to: args.required("to")?,
            },
            6 => LbStrategy::Agglomerate,
            _ => return Err(MeshDistribError::UnknownMode(raw)),
        };
        if args.next < params.len() {
            log::warn!(
                "lb: ignoring {} trailing parameter(s) of `{}`",
                params.len() - args.next,
                line.trim()
            );
        }
        Ok(Self { strategy, verbose })
    }

    /// Check the parameters against the running processes and the mesh depth.
    pub fn validate(&self, ctx: &ProcessContext, top_level: usize) -> Result<(), MeshDistribError> {
        let level_ok = |level: usize| {
            if level > top_level {
                Err(MeshDistribError::LevelOutOfRange {
                    level,
                    top: top_level,
                })
            } else {
                Ok(())
            }
        };
        let rank_ok = |rank: Rank| {
            if rank >= ctx.size() {
                Err(MeshDistribError::RankOutOfRange {
                    rank,
                    size: ctx.size(),
                })
            } else {
                Ok(())
            }
        };
        match self.strategy {
            LbStrategy::Rcb { level } => level_ok(level),
            LbStrategy::CollectToMaster { from, to } => {
                let to = to.unwrap_or(top_level);
                level_ok(from)?;
                level_ok(to)?;
                if from > to {
                    return Err(MeshDistribError::EmptyLevelRange { from, to });
                }
                Ok(())
            }
            LbStrategy::SegmentCollect { dest, level, .. } => {
                rank_ok(dest)?;
                level_ok(level)
            }
            LbStrategy::FullAssign { dest } => dest.map_or(Ok(()), rank_ok),
            LbStrategy::Structured(shape) => match shape.checked_cells() {
                Some(product) if product == ctx.size() => Ok(()),
                Some(product) => Err(MeshDistribError::GridShapeMismatch {
                    shape: shape.to_string(),
                    product,
                    size: ctx.size(),
                }),
                None => Err(MeshDistribError::InvalidParameter(format!(
                    "{shape}: box count overflows"
                ))),
            },
            LbStrategy::RcbRange { from, to } => {
                level_ok(from)?;
                level_ok(to)?;
                if from > to {
                    return Err(MeshDistribError::EmptyLevelRange { from, to });
                }
                Ok(())
            }
            LbStrategy::Agglomerate => Ok(()),
        }
    }
}

fn parse_param(token: &str) -> Result<usize, MeshDistribError> {
    token
        .parse()
        .map_err(|_| MeshDistribError::InvalidParameter(token.to_string()))
}

struct Params<'a> {
    mode: u32,
    values: &'a [usize],
    next: usize,
}

impl Params<'_> {
    fn optional(&mut self) -> Option<usize> {
        let v = self.values.get(self.next).copied();
        if v.is_some() {
            self.next += 1;
        }
        v
    }

    fn required(&mut self, name: &'static str) -> Result<usize, MeshDistribError> {
        self.optional().ok_or(MeshDistribError::MissingParameter {
            mode: self.mode,
            name,
        })
    }
}

impl FromStr for LbCommand {
    type Err = MeshDistribError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LbCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = i64::from(self.strategy.mode()) + if self.verbose { VERBOSE_OFFSET } else { 0 };
        write!(f, "{mode}")?;
        match self.strategy {
            LbStrategy::Rcb { level } => write!(f, " {level}"),
            LbStrategy::CollectToMaster { from, to } => {
                write!(f, " {from}")?;
                match to {
                    Some(to) => write!(f, " {to}"),
                    None => Ok(()),
                }
            }
            LbStrategy::SegmentCollect { part, dest, level } => {
                write!(f, " {part} {dest} {level}")
            }
            LbStrategy::FullAssign { dest: Some(d) } => write!(f, " {d}"),
            LbStrategy::FullAssign { dest: None } => Ok(()),
            LbStrategy::Structured(s) if s.depth == 1 => write!(f, " {} {}", s.hor, s.vert),
            LbStrategy::Structured(s) => write!(f, " {} {} {}", s.hor, s.vert, s.depth),
            LbStrategy::RcbRange { from, to } => write!(f, " {from} {to}"),
            LbStrategy::Agglomerate => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_optionals() {
        assert_eq!(
            LbCommand::parse("0").unwrap(),
            LbCommand::new(LbStrategy::Rcb { level: 0 })
        );
        assert_eq!(
            LbCommand::parse("1 2").unwrap().strategy,
            LbStrategy::CollectToMaster { from: 2, to: None }
        );
        assert_eq!(
            LbCommand::parse("3").unwrap().strategy,
            LbStrategy::FullAssign { dest: None }
        );
    }

    #[test]
    fn verbose_offset() {
        let cmd: LbCommand = "104 2 2".parse().unwrap();
        assert!(cmd.verbose);
        assert_eq!(cmd.strategy, LbStrategy::Structured(BoxShape::new(2, 2)));
        assert_eq!(cmd.to_string(), "104 2 2");
    }

    #[test]
    fn parse_errors() {
        assert_eq!(LbCommand::parse("  "), Err(MeshDistribError::EmptyCommand));
        assert_eq!(LbCommand::parse("7"), Err(MeshDistribError::UnknownMode(7)));
        assert_eq!(LbCommand::parse("-1"), Err(MeshDistribError::UnknownMode(-1)));
        assert_eq!(
            LbCommand::parse("5 1"),
            Err(MeshDistribError::MissingParameter { mode: 5, name: "to" })
        );
        assert_eq!(
            LbCommand::parse("0 x"),
            Err(MeshDistribError::InvalidParameter("x".into()))
        );
        assert!(LbCommand::parse("4 0 2").is_err());
    }

    #[test]
    fn validation_uses_context() {
        let ctx = ProcessContext::new(0, 4, 0).unwrap();
        assert!(LbCommand::parse("4 2 2").unwrap().validate(&ctx, 0).is_ok());
        assert!(matches!(
            LbCommand::parse("4 3 2").unwrap().validate(&ctx, 0),
            Err(MeshDistribError::GridShapeMismatch { product: 6, size: 4, .. })
        ));
        assert_eq!(
            LbCommand::parse("4 4294967296 4294967296").unwrap().validate(&ctx, 0),
            Err(MeshDistribError::InvalidParameter(
                "4294967296x4294967296: box count overflows".into()
            ))
        );
        assert_eq!(
            LbCommand::parse("2 1 4").unwrap().validate(&ctx, 0),
            Err(MeshDistribError::RankOutOfRange { rank: 4, size: 4 })
        );
        assert_eq!(
            LbCommand::parse("5 2 1").unwrap().validate(&ctx, 3),
            Err(MeshDistribError::EmptyLevelRange { from: 2, to: 1 })
        );
        assert_eq!(
            LbCommand::parse("0 2").unwrap().validate(&ctx, 1),
            Err(MeshDistribError::LevelOutOfRange { level: 2, top: 1 })
        );
    }
}
