//! # Environment Variables
//!
//! Utilities for reading and parsing environment variables.

use std::env;
use std::str::FromStr;

/// Get an environment variable by name.
pub fn get_env(name: &'static str) -> Result<String, Error> {
    env::var(name).map_err(|_| Error::MissingEnv(name))
}

/// Get an environment variable, treating unset and blank values as `None`.
pub fn get_env_opt(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|val| !val.trim().is_empty())
}

/// Get and parse an environment variable, falling back to `default` when unset.
///
/// A value that is set but does not parse is an error rather than a silent default.
pub fn get_env_parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, Error> {
    match get_env_opt(name) {
        Some(val) => val.trim().parse::<T>().map_err(|_| Error::WrongFormat(name)),
        None => Ok(default),
    }
}

// region:    --- Error
#[derive(Debug)]
pub enum Error {
    MissingEnv(&'static str),
    WrongFormat(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for Error {}
// endregion: --- Error
