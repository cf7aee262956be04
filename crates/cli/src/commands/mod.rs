pub mod cat;
pub mod cp;
pub mod find;
pub mod init;
pub mod ls;
pub mod put;
pub mod rm;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Configure the storage backend
    Init(init::InitArgs),
    /// List one level under a directory
    Ls(ls::LsArgs),
    /// Print an object to stdout
    Cat(cat::CatArgs),
    /// Upload a local file as a single object
    Put(put::PutArgs),
    /// Delete an object and everything under it
    Rm(rm::RmArgs),
    /// Copy a remote directory to a local one
    Cp(cp::CpArgs),
    /// Find objects by file name
    Find(find::FindArgs),
}
