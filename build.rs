use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Emit a config template next to the build output
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../vdkplay.template.toml");

    let template = r#"# VDKPLAY Configuration Template
# Copy this file to 'vdkplay.toml' and adjust the values

# Initial playback direction: forward | backward
direction = "forward"

# Loop mode applied at cue boundaries: none | loop | bidi
loop_mode = "loop"

# Speed multiplier, must be > 0
speed = 1.0

# Drive update() from a background thread
background = false

# Background driver tick interval in milliseconds
tick_ms = 5

# Consecutive corrupt packets tolerated before entering the error state
max_decode_failures = 8

# Upper bound on frames decoded while settling after a seek
max_settle_frames = 1000
"#;

    let _ = fs::write(template_path, template);
    println!("cargo:rerun-if-changed=build.rs");
}
