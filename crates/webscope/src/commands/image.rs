use webscope_config::{ImageSettings, version_tag};

/// CONTAINER_REGISTRY / NAMESPACE を読み、CLI の指定で上書きする
pub fn resolve_settings(registry: Option<String>, namespace: Option<String>) -> ImageSettings {
    let mut settings = ImageSettings::from_env();
    if let Some(registry) = registry.filter(|r| !r.trim().is_empty()) {
        settings.registry = registry;
    }
    if let Some(namespace) = namespace {
        settings.namespace = Some(namespace).filter(|ns| !ns.trim().is_empty());
    }
    settings
}

pub fn handle(
    registry: Option<String>,
    namespace: Option<String>,
    tag: Option<String>,
    name_only: bool,
) {
    let settings = resolve_settings(registry, namespace);

    if name_only {
        println!("{}", settings.image_name());
        return;
    }

    let tag = tag.unwrap_or_else(|| version_tag(chrono::Utc::now()));
    println!("{}", settings.image_ref(&tag));
}
