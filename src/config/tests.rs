use super::{Configuration, PoolConfig, RegistryConfig, SceneConfig, Value};

#[test]
fn test_get_or_falls_back() {
    crate::test_util::init();

    let mut config = Configuration::new();
    config.set("registry.max_entities", 10usize);
    config.set("name", "kiln".to_string());

    assert_eq!(config.get_or("registry.max_entities", 5usize), 10);
    assert_eq!(config.get_or("missing", 5usize), 5);
    // wrong type
    assert_eq!(config.get_or("name", 7i64), 7);
    assert_eq!(config.get::<String>("name").as_deref(), Some("kiln"));

    assert_eq!(config.remove("name"), Some(Value::Str("kiln".into())));
    assert!(!config.contains("name"));
}

#[test]
fn test_negative_count_is_rejected() {
    let mut config = Configuration::new();
    config.set("registry.max_entities", -1i64);
    assert_eq!(RegistryConfig::from_config(&config).max_entities, RegistryConfig::default().max_entities);
}

#[test]
fn test_typed_configs() {
    let mut config = Configuration::new();
    config.set("registry.max_entities", 100usize);
    config.set("scene.max_dynamic_objects", 3usize);
    config.set("thread_pool.workers", 0usize);

    assert_eq!(
        RegistryConfig::from_config(&config),
        RegistryConfig { max_entities: 100, view_capacity_hint: 256 }
    );
    assert_eq!(
        SceneConfig::from_config(&config),
        SceneConfig { max_static_objects: 4096, max_dynamic_objects: 3 }
    );
    assert_eq!(PoolConfig::from_config(&config).workers, 1);
}

#[test]
fn test_toml_round_trip() {
    let mut config = Configuration::new();
    config.set("registry.max_entities", 128usize);
    config.set("render.vsync", true);
    config.set("render.gamma", 2.2f64);
    config.set("window.title", "demo".to_string());

    let text = config.to_toml().expect("flat table is serializable");
    assert_eq!(Configuration::from_toml(&text).expect("just serialized"), config);

    let parsed = Configuration::from_toml("\"a.b\" = 3\nc = 1.5\n").expect("valid toml");
    assert_eq!(parsed.get::<i64>("a.b"), Some(3));
    assert_eq!(parsed.get::<f64>("c"), Some(1.5));
}

#[test]
fn test_save_and_load() {
    let path = std::env::temp_dir().join(format!("kiln-config-{}.toml", std::process::id()));

    let mut config = Configuration::new();
    config.set("scene.max_static_objects", 9usize);
    config.save(&path).expect("temp dir is writable");

    let loaded = Configuration::load(&path).expect("just saved");
    std::fs::remove_file(&path).expect("just saved");
    assert_eq!(SceneConfig::from_config(&loaded).max_static_objects, 9);

    assert!(Configuration::load(&path).is_err());
}
