mod bow_generate;
mod bow_match;
mod fd_generate;
mod fd_match;

pub use bow_generate::*;
pub use bow_match::*;
pub use fd_generate::*;
pub use fd_match::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> anyhow::Result<()>;
}
