//! Test module for jukebridge-core
//!
//! Covers behaviour that spans modules:
//! - Normalization of full player responses into attribute maps
//! - Cadence selection driven by normalization
//! - Command resolution against the command table
//! - Topic parsing feeding command resolution

mod normalize_tests;
