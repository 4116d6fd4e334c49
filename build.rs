//! Renders the `qingcloud-flex-volume(1)` man page into `OUT_DIR`.
//!
//! Node packages install the driver binary under the kubelet plugin
//! directory and pick the man page up from the build output, so the page is
//! rendered from the same clap definitions the driver parses at runtime.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

const MAN_PAGE: &str = "qingcloud-flex-volume.1";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    for watched in ["build.rs", "src/cli/mod.rs"] {
        writeln!(stdout, "cargo:rerun-if-changed={watched}")?;
    }

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    let mut page = Vec::new();
    Man::new(Cli::command())
        .section("1")
        .manual("QingCloud FlexVolume driver")
        .render(&mut page)?;
    File::create(out_dir.join(MAN_PAGE))?.write_all(&page)?;

    Ok(())
}
