//
// cli/mod.rs
//
// Developer subcommands of the fioricheck binary
//

pub mod analysis_stats;
