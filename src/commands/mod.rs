//! # Tareas por Línea
//!
//! Trabajo que el binario aplica a cada línea del input:
//!
//! - **hash**: SHA-256 en hex
//! - **grep**: cantidad de matches de una regex
//! - **words**: cantidad de palabras
//! - **sum**: suma de los enteros de la línea
//!
//! Cada tarea es una función pura sobre `&str`; el binario la envuelve en
//! una unidad de trabajo del job.

pub mod line;

pub use line::LineTask;
