use figment::{providers::{Format, Toml}, Figment, Jail};

use sap_core::config::{expand_path, resolve_with_base, Config};
use sap_core::types::Modality;
use sap_core::Error;

#[test]
fn defaults_apply_when_nothing_is_configured() {
    let config = Config::from_figment(Figment::new());
    let settings = config.settings().expect("settings");
    assert_eq!(settings.retrieval.top_k, 5);
    assert_eq!(settings.retrieval.k_rrf, 60);
    assert_eq!(settings.retrieval.context_items, 3);
    assert_eq!(settings.providers.embed_path, "/embed");
    assert!(settings.providers.normalize);
    settings.validate().expect("defaults are valid");
}

#[test]
fn toml_and_env_layers_override_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [retrieval]
            top_k = 8

            [stores]
            base_dir = "/srv/sap/stores"
            image_dir = "dino"
            "#,
        )?;
        jail.set_env("RUST_ENV", "test");
        jail.set_env("APP_RETRIEVAL__K_RRF", "30");

        let config = Config::load().expect("load");
        let settings = config.settings().expect("settings");
        assert_eq!(settings.retrieval.top_k, 8);
        assert_eq!(settings.retrieval.k_rrf, 30);
        assert_eq!(settings.stores.dir_for(Modality::Image).to_string_lossy(), "/srv/sap/stores/dino");
        assert_eq!(settings.stores.dir_for(Modality::Text).to_string_lossy(), "/srv/sap/stores/text_faiss");

        let top_k: usize = config.get("retrieval.top_k").expect("get");
        assert_eq!(top_k, 8);
        Ok(())
    });
}

#[test]
fn zero_top_k_is_rejected() {
    let figment = Figment::new().merge(Toml::string("[retrieval]\ntop_k = 0"));
    let settings = Config::from_figment(figment).settings().expect("settings");
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn zero_timeout_is_rejected() {
    let figment = Figment::new().merge(Toml::string("[providers]\ntimeout_secs = 0"));
    let settings = Config::from_figment(figment).settings().expect("settings");
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn relative_paths_resolve_against_base() {
    let base = std::path::Path::new("/data");
    assert_eq!(resolve_with_base(base, "text_faiss"), std::path::PathBuf::from("/data/text_faiss"));
    assert_eq!(resolve_with_base(base, "/abs/caption"), std::path::PathBuf::from("/abs/caption"));
    assert_eq!(expand_path("plain/dir"), std::path::PathBuf::from("plain/dir"));
}
