pub mod error;
pub mod logging;

#[cfg(test)]
pub mod assertions;
