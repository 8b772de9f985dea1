use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use std::path::Path;

use kbrag_core::config::{resolve_with_base, Config, Settings};
use kbrag_core::Error;

fn config_from(toml: &str) -> Config {
    Config::from_figment(Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml)))
}

#[test]
fn defaults_match_documented_values() {
    let s = config_from("").settings().unwrap();
    assert_eq!(s.data.raw_dir, "data/raw");
    assert_eq!(s.data.index_dir, "data/index");
    assert_eq!((s.chunking.max_size, s.chunking.overlap), (800, 100));
    assert_eq!(s.embedding.model, "text-embedding-3-large");
    assert_eq!(s.embedding.dimensions, None);
    assert_eq!(s.chat.model, "gpt-4.1-mini");
    assert_eq!(s.chat.max_agent_steps, 6);
    assert_eq!((s.retrieval.default_k, s.retrieval.max_k), (3, 8));
    assert_eq!(s.server.port, 8000);
}

#[test]
fn toml_layer_overrides_only_what_it_names() {
    let cfg = config_from(
        r#"
        [chat]
        model = "gpt-4o-mini"

        [embedding]
        dimensions = 256
        "#,
    );
    let s = cfg.settings().unwrap();
    assert_eq!(s.chat.model, "gpt-4o-mini");
    assert!((s.chat.chain_temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(s.embedding.dimensions, Some(256));
    assert_eq!(cfg.get::<String>("chat.model").unwrap(), "gpt-4o-mini");
}

#[test]
fn overlap_not_below_max_size_fails_validation() {
    let err = config_from("[chunking]\nmax_size = 100\noverlap = 100\n").settings().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn default_k_above_max_k_fails_validation() {
    let err = config_from("[retrieval]\ndefault_k = 9\nmax_k = 8\n").settings().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn wrong_value_type_is_a_config_error() {
    let err = config_from("[server]\nport = \"eighty\"\n").settings().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn relative_data_dirs_resolve_against_base() {
    let s = config_from("[data]\nindex_dir = \"/var/lib/kb/index\"\n").settings().unwrap();
    let base = Path::new("/srv/app");
    assert_eq!(s.data.raw_dir_path(base), Path::new("/srv/app/data/raw"));
    assert_eq!(s.data.index_dir_path(base), Path::new("/var/lib/kb/index"));
    assert_eq!(resolve_with_base(base, "docs"), Path::new("/srv/app/docs"));
}
