//! # Utilidades de Texto
//! src/text.rs
//!
//! - `lines`: itera las líneas de un stream de bytes con un encoding dado
//! - `open_lines`: lo mismo sobre un archivo
//! - `mk_str`: une una secuencia con un separador
//!
//! Encodings soportados: `utf-8`, `utf-8-lossy` y `latin1` (ISO-8859-1).

use crate::error::{JobError, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

/// Encoding de texto para leer líneas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// UTF-8 estricto, bytes inválidos son un error
    #[default]
    Utf8,
    /// UTF-8 reemplazando bytes inválidos por U+FFFD
    Utf8Lossy,
    /// ISO-8859-1, cada byte es un code point
    Latin1,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf8Lossy => "utf-8-lossy",
            Encoding::Latin1 => "latin1",
        }
    }

    /// Decodifica una línea ya sin terminador
    pub fn decode(&self, bytes: Vec<u8>) -> Result<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes)
                .map_err(|e| JobError::Encoding(format!("invalid utf-8: {}", e))),
            Encoding::Utf8Lossy => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Encoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

impl FromStr for Encoding {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "utf-8-lossy" | "utf8-lossy" | "lossy" => Ok(Encoding::Utf8Lossy),
            "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" => Ok(Encoding::Latin1),
            other => Err(JobError::Encoding(other.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Iterador de líneas. Quita `\n` y `\r\n` del final
pub struct Lines<R> {
    reader: R,
    encoding: Encoding,
    done: bool,
}

impl<R: BufRead> Iterator for Lines<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                Some(self.encoding.decode(buf))
            }
            Err(e) => {
                self.done = true;
                Some(Err(JobError::Io(e)))
            }
        }
    }
}

/// Líneas de un reader cualquiera
pub fn lines<R: Read>(reader: R, encoding: Encoding) -> Lines<BufReader<R>> {
    Lines {
        reader: BufReader::new(reader),
        encoding,
        done: false,
    }
}

/// Abre un archivo y retorna sus líneas
pub fn open_lines<P: AsRef<Path>>(path: P, encoding: Encoding) -> Result<Lines<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(lines(file, encoding))
}

/// Une los elementos con `sep`. `None` si la secuencia está vacía
pub fn mk_str<I, F>(iter: I, sep: &str, mut to_text: F) -> Option<String>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> String,
{
    let mut iter = iter.into_iter();
    let mut out = to_text(iter.next()?);
    for item in iter {
        out.push_str(sep);
        out.push_str(&to_text(item));
    }
    Some(out)
}
