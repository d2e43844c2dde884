fn main() {
    let version = get_version();
    println!("cargo:rustc-env=SHEETDO_VERSION={}", version);

    // Declare dev_build as a valid cfg so the compiler doesn't warn about it.
    println!("cargo:rustc-check-cfg=cfg(dev_build)");

    if version.contains("-dev") {
        println!("cargo:rustc-cfg=dev_build");
    }
}

fn get_version() -> String {
    // CI release workflow exports the tag without its `v` prefix
    if let Ok(release_version) = std::env::var("SHEETDO_RELEASE_VERSION") {
        return release_version.trim_start_matches('v').to_string();
    }

    env!("CARGO_PKG_VERSION").to_string()
}
