use std::{io::Cursor, path::PathBuf};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "coverkit_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn write_png(path: &std::path::Path, width: u32, height: u32, px: [u8; 4]) {
    let mut raw = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..width * height {
        raw.extend_from_slice(&px);
    }
    let img = image::RgbaImage::from_raw(width, height, raw).unwrap();
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(path, &buf).unwrap();
}

fn coverkit_exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_coverkit")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "coverkit.exe"
            } else {
                "coverkit"
            });
            p
        })
}

#[test]
fn cli_scale_writes_fitted_png() {
    let tmp = temp_dir("cli_scale");
    std::fs::create_dir_all(&tmp).unwrap();

    let in_path = tmp.join("cover.png");
    let out_path = tmp.join("out.png");
    write_png(&in_path, 400, 100, [12, 34, 56, 255]);

    let status = std::process::Command::new(coverkit_exe())
        .args(["scale", "--width", "200", "--height", "200", "--in"])
        .arg(&in_path)
        .arg("--out")
        .arg(&out_path)
        .status()
        .unwrap();

    assert!(status.success());
    let out = image::open(&out_path).unwrap();
    assert_eq!((out.width(), out.height()), (200, 50));

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn cli_rating_composes_strip() {
    let tmp = temp_dir("cli_rating");
    std::fs::create_dir_all(&tmp).unwrap();

    let active = tmp.join("active.png");
    let inactive = tmp.join("inactive.png");
    let out_path = tmp.join("strip.png");
    write_png(&active, 8, 8, [255, 190, 0, 255]);
    write_png(&inactive, 8, 8, [80, 80, 80, 255]);

    let status = std::process::Command::new(coverkit_exe())
        .args(["rating", "--maximum", "5", "--rating", "3", "--active"])
        .arg(&active)
        .arg("--inactive")
        .arg(&inactive)
        .arg("--out")
        .arg(&out_path)
        .status()
        .unwrap();

    assert!(status.success());
    let out = image::open(&out_path).unwrap();
    assert_eq!((out.width(), out.height()), (40, 8));

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn cli_crossfade_writes_every_step() {
    let tmp = temp_dir("cli_crossfade");
    std::fs::create_dir_all(&tmp).unwrap();

    let from = tmp.join("from.png");
    let to = tmp.join("to.png");
    let out_dir = tmp.join("frames");
    write_png(&from, 16, 16, [0, 0, 0, 255]);
    write_png(&to, 16, 16, [255, 255, 255, 255]);

    let status = std::process::Command::new(coverkit_exe())
        .args(["crossfade", "--steps", "4", "--from"])
        .arg(&from)
        .arg("--to")
        .arg(&to)
        .arg("--out-dir")
        .arg(&out_dir)
        .status()
        .unwrap();

    assert!(status.success());
    for step in 1..=4 {
        assert!(out_dir.join(format!("frame_{step:04}.png")).exists());
    }
    assert!(!out_dir.join("frame_0005.png").exists());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn cli_rejects_corrupt_cover() {
    let tmp = temp_dir("cli_bad_input");
    std::fs::create_dir_all(&tmp).unwrap();

    let in_path = tmp.join("garbage.png");
    std::fs::write(&in_path, b"not an image").unwrap();

    let status = std::process::Command::new(coverkit_exe())
        .args(["scale", "--width", "64", "--height", "64", "--in"])
        .arg(&in_path)
        .arg("--out")
        .arg(tmp.join("out.png"))
        .status()
        .unwrap();

    assert!(!status.success());

    std::fs::remove_dir_all(&tmp).ok();
}
