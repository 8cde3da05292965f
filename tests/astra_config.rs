use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use astra_face::config::AstraConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ASTRA_CONFIG",
        "ASTRA_FACES_DIR",
        "ASTRA_DETECTOR_MODEL",
        "ASTRA_RECOGNIZER_MODEL",
        "ASTRA_CAMERA_DEVICE",
        "ASTRA_CONFIDENCE_THRESHOLD",
        "ASTRA_DISPLAY_PATH",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, contents.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AstraConfig::load().expect("load config");

    assert_eq!(cfg.faces_dir, PathBuf::from("../Faces"));
    assert_eq!(
        cfg.detector.model_path,
        PathBuf::from("../Models/seeta_fd_frontal_v1.0.bin")
    );
    assert_eq!(
        cfg.recognizer_model,
        PathBuf::from("../Models/face_recognizer.json")
    );
    assert_eq!(cfg.confidence_threshold, 0.2);
    assert_eq!(cfg.camera.device, "/dev/video0");
    assert_eq!(cfg.camera.target_fps, 30);
    assert_eq!(cfg.display.path, None);
    assert_eq!(cfg.max_frames, None);
    assert_eq!(cfg.lbph.radius, 1);
    assert_eq!(cfg.lbph.neighbors, 8);
    assert_eq!((cfg.lbph.grid_x, cfg.lbph.grid_y), (8, 8));
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
        faces_dir = "/srv/faces"
        recognizer_model = "/srv/models/lbph.json"
        confidence_threshold = 0.35
        max_frames = 500

        [detector]
        backend = "stub"
        model = "/srv/models/seeta.bin"
        min_face_size = 60

        [lbph]
        radius = 2
        grid_x = 4
        grid_y = 4

        [camera]
        device = "/dev/video2"
        target_fps = 15
        width = 1280
        height = 720

        [display]
        path = "/tmp/astra/latest.png"
        width = 800
        height = 600
        "#,
    );

    std::env::set_var("ASTRA_CONFIG", file.path());
    std::env::set_var("ASTRA_CAMERA_DEVICE", "stub://lab");
    std::env::set_var("ASTRA_CONFIDENCE_THRESHOLD", "0.5");

    let cfg = AstraConfig::load().expect("load config");

    assert_eq!(cfg.faces_dir, PathBuf::from("/srv/faces"));
    assert_eq!(cfg.recognizer_model, PathBuf::from("/srv/models/lbph.json"));
    assert_eq!(cfg.confidence_threshold, 0.5);
    assert_eq!(cfg.max_frames, Some(500));
    assert_eq!(cfg.detector.backend, "stub");
    assert_eq!(cfg.detector.model_path, PathBuf::from("/srv/models/seeta.bin"));
    assert_eq!(cfg.detector.min_face_size, 60);
    assert_eq!(cfg.lbph.radius, 2);
    assert_eq!(cfg.lbph.neighbors, 8);
    assert_eq!((cfg.lbph.grid_x, cfg.lbph.grid_y), (4, 4));
    assert_eq!(cfg.camera.device, "stub://lab");
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!((cfg.camera.width, cfg.camera.height), (1280, 720));
    assert_eq!(
        cfg.display.path,
        Some(PathBuf::from("/tmp/astra/latest.png"))
    );
    assert_eq!((cfg.display.width, cfg.display.height), (800, 600));

    clear_env();
}

#[test]
fn env_paths_override_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ASTRA_FACES_DIR", "/data/faces");
    std::env::set_var("ASTRA_DETECTOR_MODEL", "/data/seeta.bin");
    std::env::set_var("ASTRA_RECOGNIZER_MODEL", "/data/model.json");
    std::env::set_var("ASTRA_DISPLAY_PATH", "/data/view.png");

    let cfg = AstraConfig::load().expect("load config");

    assert_eq!(cfg.faces_dir, PathBuf::from("/data/faces"));
    assert_eq!(cfg.detector.model_path, PathBuf::from("/data/seeta.bin"));
    assert_eq!(cfg.recognizer_model, PathBuf::from("/data/model.json"));
    assert_eq!(cfg.display.path, Some(PathBuf::from("/data/view.png")));

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ASTRA_CONFIDENCE_THRESHOLD", "high");
    assert!(AstraConfig::load().is_err());
    clear_env();

    let file = write_config("[camera]\ntarget_fps = 0\n");
    std::env::set_var("ASTRA_CONFIG", file.path());
    assert!(AstraConfig::load().is_err());
    clear_env();

    let file = write_config("[display]\nwidth = 0\n");
    std::env::set_var("ASTRA_CONFIG", file.path());
    assert!(AstraConfig::load().is_err());
    clear_env();

    let file = write_config("[lbph]\nneighbors = 32\n");
    std::env::set_var("ASTRA_CONFIG", file.path());
    assert!(AstraConfig::load().is_err());
    clear_env();

    let file = write_config("unknown_key = 1\n");
    std::env::set_var("ASTRA_CONFIG", file.path());
    assert!(AstraConfig::load().is_err());
    clear_env();

    std::env::set_var("ASTRA_CONFIG", "/nonexistent/astra.toml");
    assert!(AstraConfig::load().is_err());
    clear_env();
}
