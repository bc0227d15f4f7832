use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const TEMPLATE_DIR: &str = "templates";

fn main() {
    // Askama compiles templates into the binary; edits must rebuild it.
    println!("cargo:rerun-if-changed={}", TEMPLATE_DIR);
    if let Err(e) = watch_templates(Path::new(TEMPLATE_DIR)) {
        println!("cargo:warning=could not scan {}: {}", TEMPLATE_DIR, e);
    }

    // Shown in the page footer.
    let build_id = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| format!("{:x}", d.as_secs()))
        .unwrap_or_else(|_| "dev".to_string());
    println!("cargo:rustc-env=NEEDS_BUILD_ID={}", build_id);
}

fn watch_templates(dir: &Path) -> io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            watch_templates(&path)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            println!("cargo:rerun-if-changed={}", path.display());
        }
    }
    Ok(())
}
