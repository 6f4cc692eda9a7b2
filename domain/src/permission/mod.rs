//! Permission domain: remembered decisions and arbiter outcomes.

pub mod entities;
