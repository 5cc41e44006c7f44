//! # Tareas de Línea
//! src/commands/line.rs

use crate::config::{Config, TaskKind};
use anyhow::{anyhow, Context};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Tarea lista para ejecutarse sobre líneas (regex ya compilada)
#[derive(Debug, Clone)]
pub enum LineTask {
    Hash,
    Grep(Regex),
    Words,
    Sum,
}

impl LineTask {
    /// Construye la tarea configurada
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(match config.task {
            TaskKind::Hash => LineTask::Hash,
            TaskKind::Grep => {
                let pattern = config
                    .pattern
                    .as_deref()
                    .ok_or_else(|| anyhow!("task grep requires a pattern"))?;
                LineTask::Grep(Regex::new(pattern).context("invalid grep pattern")?)
            }
            TaskKind::Words => LineTask::Words,
            TaskKind::Sum => LineTask::Sum,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            LineTask::Hash => "hash",
            LineTask::Grep(_) => "grep",
            LineTask::Words => "words",
            LineTask::Sum => "sum",
        }
    }

    /// Aplica la tarea a una línea
    pub fn apply(&self, line: &str) -> anyhow::Result<String> {
        match self {
            LineTask::Hash => Ok(sha256_hex(line)),
            LineTask::Grep(re) => Ok(re.find_iter(line).count().to_string()),
            LineTask::Words => Ok(line.split_whitespace().count().to_string()),
            LineTask::Sum => sum_integers(line).map(|n| n.to_string()),
        }
    }
}

/// SHA-256 de la línea en hex
fn sha256_hex(line: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(line.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Suma los enteros separados por espacios o comas
fn sum_integers(line: &str) -> anyhow::Result<i64> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .try_fold(0i64, |acc, token| {
            let n: i64 = token
                .parse()
                .with_context(|| format!("not an integer: {:?}", token))?;
            acc.checked_add(n).ok_or_else(|| anyhow!("sum overflow"))
        })
}
