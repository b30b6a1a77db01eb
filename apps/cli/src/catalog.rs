//! Plugin names accepted in `[pipeline] plugins`.

use gransk_core::Subscriber;
use gransk_extractor::{ArchiveUnpacker, FileMeta, PlainText, StoreFile, TikaExtractor};
use gransk_relations::{
    EntityDetector, entity_network_plugin, related_documents_plugin, related_entities_plugin,
};
use gransk_shared::{GranskError, Result};

/// Build a fresh, not yet set up plugin by name.
pub(crate) fn create(name: &str) -> Result<Box<dyn Subscriber>> {
    let plugin: Box<dyn Subscriber> = match name {
        "store_file" => Box::new(StoreFile::new()),
        "file_meta" => Box::new(FileMeta),
        "plain_text" => Box::new(PlainText),
        "archive" => Box::new(ArchiveUnpacker::new()),
        "tika_extractor" => Box::new(TikaExtractor::new()),
        "entities" => Box::new(EntityDetector),
        "related_entities" => Box::new(related_entities_plugin()),
        "related_documents" => Box::new(related_documents_plugin()),
        "entity_network" => Box::new(entity_network_plugin()),
        other => return Err(GranskError::config(format!("unknown plugin '{other}'"))),
    };
    Ok(plugin)
}

/// Instantiate `names` in order.
pub(crate) fn create_all(names: &[String]) -> Result<Vec<Box<dyn Subscriber>>> {
    names.iter().map(|name| create(name)).collect()
}

#[cfg(test)]
mod tests {
    use gransk_shared::GranskConfig;

    use super::*;

    #[test]
    fn default_plugin_list_is_known() {
        let config = GranskConfig::default();
        let plugins = create_all(&config.pipeline.plugins).unwrap();
        let names: Vec<_> = plugins.iter().map(|p| p.name()).collect();
        assert_eq!(names, config.pipeline.plugins);
    }

    #[test]
    fn unknown_plugin_is_config_error() {
        let err = create("nope").err().unwrap();
        assert!(matches!(err, GranskError::Config { .. }));
    }
}
