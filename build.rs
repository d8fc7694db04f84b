// build.rs

use chrono::Utc;
use std::env;
use std::fs;
use std::path::Path;

fn main() {
    let out_dir = env::var("OUT_DIR").expect("cargo sets OUT_DIR");
    let dest_path = Path::new(&out_dir).join("build_info.rs");

    let build_date = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

    // included by main.rs for the startup banner
    fs::write(&dest_path, format!("pub const BUILD_DATE: &str = \"{}\";", build_date))
        .expect("write build_info.rs");

    println!("cargo:rerun-if-changed=build.rs");
}
