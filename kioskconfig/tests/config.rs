use kioskconfig::{Config, VideoUpdate};
use std::fs;
use tempfile::TempDir;

fn create_test_config() -> (TempDir, Config) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config::load_config(temp_dir.path().to_str().unwrap()).unwrap();
    (temp_dir, config)
}

fn touch(config: &Config, name: &str) {
    let library = config.get_library_dir().unwrap();
    fs::write(library.join(name), b"not really a video").unwrap();
}

fn update(path: &str, enabled: bool, order: i64) -> VideoUpdate {
    VideoUpdate {
        path: path.to_string(),
        enabled,
        order,
        name: None,
        title: None,
        description: None,
        duration: None,
    }
}

#[test]
fn test_defaults_are_written() {
    let (temp_dir, config) = create_test_config();

    assert!(temp_dir.path().join("config.yaml").exists());
    assert_eq!(config.get_display_name().unwrap(), "Main Gallery Display");
    assert!(!config.get_preview_enabled().unwrap());
    assert_eq!(config.get_status_interval_ms().unwrap(), 5000);
    assert_eq!(config.get_preview_interval_ms().unwrap(), 1000);
    assert!(config.get_videos().unwrap().is_empty());
}

#[test]
fn test_rescan_discovers_video_files_only() {
    let (_temp_dir, config) = create_test_config();
    touch(&config, "b_clip.mp4");
    touch(&config, "a_clip.MKV");
    touch(&config, "notes.txt");
    touch(&config, "a_clip.srt");

    let count = config.rescan_videos().unwrap();
    assert_eq!(count, 2);

    let videos = config.get_videos().unwrap();
    let names: Vec<&str> = videos.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["a_clip.MKV", "b_clip.mp4"]);
    assert_eq!(videos[0].order, 0);
    assert_eq!(videos[1].order, 1);
    assert!(videos.iter().all(|v| v.enabled && v.lacks_metadata()));
}

#[test]
fn test_rescan_preserves_runtime_fields() {
    let (_temp_dir, config) = create_test_config();
    touch(&config, "one.mp4");
    touch(&config, "two.mp4");
    config.rescan_videos().unwrap();

    let videos = config.get_videos().unwrap();
    let one = videos[0].path.clone();
    let two = videos[1].path.clone();

    config
        .update_videos(vec![update(&one, false, 7), update(&two, true, 1)])
        .unwrap();
    config.set_video_metadata(&two, "Two", "second", 4).unwrap();

    // Un nouveau fichier apparaît, un autre disparaît
    touch(&config, "three.mp4");
    config.rescan_videos().unwrap();

    let one_after = config.get_video_by_path(&one).unwrap().unwrap();
    assert!(!one_after.enabled);
    assert_eq!(one_after.order, 7);

    let two_after = config.get_video_by_path(&two).unwrap().unwrap();
    assert_eq!(two_after.title, "Two");
    assert_eq!(two_after.duration_minutes, 4);

    fs::remove_file(&one).unwrap();
    config.rescan_videos().unwrap();
    assert!(config.get_video_by_path(&one).unwrap().is_none());
    assert_eq!(config.get_videos().unwrap().len(), 2);
}

#[test]
fn test_update_videos_keeps_stored_metadata() {
    let (_temp_dir, config) = create_test_config();
    touch(&config, "clip.mp4");
    config.rescan_videos().unwrap();
    let path = config.get_videos().unwrap()[0].path.clone();
    config
        .set_video_metadata(&path, "Stored Title", "Stored description", 3)
        .unwrap();

    let mut request = update(&path, true, 2);
    request.title = Some("Client Title".to_string());
    request.duration = Some(99);
    config.update_videos(vec![request]).unwrap();

    let video = config.get_video_by_path(&path).unwrap().unwrap();
    assert_eq!(video.title, "Stored Title");
    assert_eq!(video.description, "Stored description");
    assert_eq!(video.duration_minutes, 3);
    assert_eq!(video.order, 2);
}

#[test]
fn test_enabled_videos_sorted_by_order_is_stable() {
    let (_temp_dir, config) = create_test_config();
    for name in ["a.mp4", "b.mp4", "c.mp4", "d.mp4"] {
        touch(&config, name);
    }
    config.rescan_videos().unwrap();
    let paths: Vec<String> = config
        .get_videos()
        .unwrap()
        .into_iter()
        .map(|v| v.path)
        .collect();

    config
        .update_videos(vec![
            update(&paths[0], true, 2),
            update(&paths[1], true, 1),
            update(&paths[2], false, 0),
            update(&paths[3], true, 1),
        ])
        .unwrap();

    let enabled = config.get_enabled_videos_sorted_by_order().unwrap();
    let ordered: Vec<&str> = enabled.iter().map(|v| v.path.as_str()).collect();
    assert_eq!(ordered, vec![&paths[1], &paths[3], &paths[0]]);
}

#[test]
fn test_toggle_preview_is_persisted() {
    let (temp_dir, config) = create_test_config();

    assert!(config.toggle_preview().unwrap());
    assert!(config.get_preview_enabled().unwrap());

    let reloaded = Config::load_config(temp_dir.path().to_str().unwrap()).unwrap();
    assert!(reloaded.get_preview_enabled().unwrap());

    assert!(!reloaded.toggle_preview().unwrap());
    assert!(reloaded.toggle_dark_mode().is_ok());
}

#[test]
fn test_invalid_config_file_falls_back_to_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("config.yaml"), "display_name: [unclosed").unwrap();

    let config = Config::load_config(temp_dir.path().to_str().unwrap()).unwrap();
    assert_eq!(config.get_display_name().unwrap(), "Main Gallery Display");
}
