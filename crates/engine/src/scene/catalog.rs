use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use thiserror::Error;
use tracing::warn;

use super::world::{SceneWorld, Vec2};
use crate::progression::CheckpointMarker;

const SCENE_FILE_EXTENSION: &str = "xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Error)]
pub enum SceneLoadError {
    #[error("unknown scene '{scene_id}'")]
    UnknownScene { scene_id: String },
    #[error("failed to read scene directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read scene file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{message} (scene={scene_id}, line={}, column={})", .location.line, .location.column)]
    Invalid {
        scene_id: String,
        message: String,
        location: SourceLocation,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityDef {
    Checkpoint {
        name: String,
        explicit_id: Option<String>,
        position: Vec2,
        is_default_for_scene: bool,
        trigger_radius: Option<f32>,
    },
    Prop {
        name: String,
        position: Vec2,
    },
}

/// Authored content of one scene, parsed but not yet instantiated.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDef {
    pub id: String,
    pub player_name: String,
    pub player_spawn: Vec2,
    pub entities: Vec<EntityDef>,
}

impl SceneDef {
    /// Builds a fresh world: player first, then entities in authoring order.
    pub fn instantiate(&self, default_trigger_radius: f32) -> SceneWorld {
        let mut world = SceneWorld::new(self.id.clone());
        world.spawn_player(self.player_name.clone(), self.player_spawn);

        let mut seen_ids = HashSet::<String>::new();
        for def in &self.entities {
            match def {
                EntityDef::Checkpoint {
                    name,
                    explicit_id,
                    position,
                    is_default_for_scene,
                    trigger_radius,
                } => {
                    let marker =
                        CheckpointMarker::new(name, explicit_id.as_deref(), *is_default_for_scene)
                            .with_trigger_radius(trigger_radius.unwrap_or(default_trigger_radius));
                    if !seen_ids.insert(marker.identifier().to_string()) {
                        warn!(
                            scene = %self.id,
                            checkpoint = %marker.identifier(),
                            "duplicate_checkpoint_identifier_first_marker_wins"
                        );
                    }
                    world.spawn_checkpoint(name.clone(), *position, marker);
                }
                EntityDef::Prop { name, position } => {
                    world.spawn_prop(name.clone(), *position);
                }
            }
        }

        world.apply_pending();
        world
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SceneSource {
    File(PathBuf),
    Inline(String),
}

/// Scene id to source lookup. Scene ids are file stems of `*.xml` files.
#[derive(Debug, Clone, Default)]
pub struct SceneCatalog {
    sources: BTreeMap<String, SceneSource>,
}

impl SceneCatalog {
    pub fn discover(scenes_dir: &Path) -> Result<Self, SceneLoadError> {
        let entries = fs::read_dir(scenes_dir).map_err(|source| SceneLoadError::ReadDir {
            path: scenes_dir.to_path_buf(),
            source,
        })?;

        let mut sources = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|source| SceneLoadError::ReadDir {
                path: scenes_dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            let is_scene_file = path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(SCENE_FILE_EXTENSION));
            if !is_scene_file {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            sources.insert(stem.to_string(), SceneSource::File(path.clone()));
        }

        Ok(Self { sources })
    }

    pub fn insert_inline(&mut self, scene_id: impl Into<String>, xml: impl Into<String>) {
        self.sources
            .insert(scene_id.into(), SceneSource::Inline(xml.into()));
    }

    pub fn contains(&self, scene_id: &str) -> bool {
        self.sources.contains_key(scene_id)
    }

    pub fn scene_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub(crate) fn read_source(&self, scene_id: &str) -> Result<String, SceneLoadError> {
        match self.sources.get(scene_id) {
            Some(SceneSource::File(path)) => {
                fs::read_to_string(path).map_err(|source| SceneLoadError::ReadFile {
                    path: path.clone(),
                    source,
                })
            }
            Some(SceneSource::Inline(xml)) => Ok(xml.clone()),
            None => Err(SceneLoadError::UnknownScene {
                scene_id: scene_id.to_string(),
            }),
        }
    }
}

pub fn parse_scene_document(scene_id: &str, raw: &str) -> Result<SceneDef, SceneLoadError> {
    let doc = Document::parse(raw).map_err(|error| SceneLoadError::Invalid {
        scene_id: scene_id.to_string(),
        message: format!("malformed XML: {error}"),
        location: SourceLocation {
            line: error.pos().row,
            column: error.pos().col,
        },
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Scene" {
        return Err(error_at_node(
            scene_id,
            &doc,
            root,
            "root element must be <Scene>".to_string(),
        ));
    }
    reject_unknown_attributes(scene_id, &doc, root, &[])?;

    let mut player: Option<(String, Vec2)> = None;
    let mut entities = Vec::<EntityDef>::new();
    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "Player" => {
                if player.is_some() {
                    return Err(error_at_node(
                        scene_id,
                        &doc,
                        child,
                        "duplicate <Player>; a scene has exactly one player spawn".to_string(),
                    ));
                }
                reject_unknown_attributes(scene_id, &doc, child, &["name", "x", "y"])?;
                let name = child.attribute("name").unwrap_or("Player").to_string();
                player = Some((name, parse_position(scene_id, &doc, child)?));
            }
            "Checkpoint" => {
                reject_unknown_attributes(
                    scene_id,
                    &doc,
                    child,
                    &["name", "id", "x", "y", "default", "radius"],
                )?;
                entities.push(EntityDef::Checkpoint {
                    name: required_attribute(scene_id, &doc, child, "name")?,
                    explicit_id: child.attribute("id").map(ToString::to_string),
                    position: parse_position(scene_id, &doc, child)?,
                    is_default_for_scene: parse_bool(scene_id, &doc, child, "default")?,
                    trigger_radius: parse_radius(scene_id, &doc, child)?,
                });
            }
            "Prop" => {
                reject_unknown_attributes(scene_id, &doc, child, &["name", "x", "y"])?;
                entities.push(EntityDef::Prop {
                    name: required_attribute(scene_id, &doc, child, "name")?,
                    position: parse_position(scene_id, &doc, child)?,
                });
            }
            other => {
                return Err(error_at_node(
                    scene_id,
                    &doc,
                    child,
                    format!("unknown element <{other}>; expected <Player>, <Checkpoint> or <Prop>"),
                ))
            }
        }
    }

    let Some((player_name, player_spawn)) = player else {
        return Err(error_at_node(
            scene_id,
            &doc,
            root,
            "missing required <Player> spawn".to_string(),
        ));
    };

    Ok(SceneDef {
        id: scene_id.to_string(),
        player_name,
        player_spawn,
        entities,
    })
}

fn required_attribute(
    scene_id: &str,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
) -> Result<String, SceneLoadError> {
    let value = node.attribute(name).map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(error_at_node(
            scene_id,
            doc,
            node,
            format!(
                "<{}> requires a non-empty '{name}' attribute",
                node.tag_name().name()
            ),
        ));
    }
    Ok(value.to_string())
}

fn parse_position(
    scene_id: &str,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<Vec2, SceneLoadError> {
    Ok(Vec2 {
        x: parse_coordinate(scene_id, doc, node, "x")?,
        y: parse_coordinate(scene_id, doc, node, "y")?,
    })
}

fn parse_coordinate(
    scene_id: &str,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
) -> Result<f32, SceneLoadError> {
    let Some(raw) = node.attribute(name) else {
        return Ok(0.0);
    };
    match raw.trim().parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(error_at_node(
            scene_id,
            doc,
            node,
            format!("'{name}' value '{raw}' is not a finite number"),
        )),
    }
}

fn parse_bool(
    scene_id: &str,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
) -> Result<bool, SceneLoadError> {
    match node.attribute(name).map(str::trim) {
        None => Ok(false),
        Some(value) if value.eq_ignore_ascii_case("true") => Ok(true),
        Some(value) if value.eq_ignore_ascii_case("false") => Ok(false),
        Some(value) => Err(error_at_node(
            scene_id,
            doc,
            node,
            format!("'{name}' value '{value}' must be true or false"),
        )),
    }
}

fn parse_radius(
    scene_id: &str,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<Option<f32>, SceneLoadError> {
    let Some(raw) = node.attribute("radius") else {
        return Ok(None);
    };
    match raw.trim().parse::<f32>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(Some(value)),
        _ => Err(error_at_node(
            scene_id,
            doc,
            node,
            format!("'radius' value '{raw}' must be a positive number"),
        )),
    }
}

fn reject_unknown_attributes(
    scene_id: &str,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    allowed: &[&str],
) -> Result<(), SceneLoadError> {
    for attribute in node.attributes() {
        if !allowed.contains(&attribute.name()) {
            return Err(error_at_node(
                scene_id,
                doc,
                node,
                format!(
                    "unknown attribute '{}' on <{}>",
                    attribute.name(),
                    node.tag_name().name()
                ),
            ));
        }
    }
    Ok(())
}

fn error_at_node(
    scene_id: &str,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    message: String,
) -> SceneLoadError {
    let pos = doc.text_pos_at(node.range().start);
    SceneLoadError::Invalid {
        scene_id: scene_id.to_string(),
        message,
        location: SourceLocation {
            line: pos.row,
            column: pos.col,
        },
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const CAVE: &str = r#"<Scene>
  <Player x="0" y="0"/>
  <Checkpoint name="EntranceMarker" id="CP_Entrance" x="1" y="2"/>
  <Checkpoint name="CP_Exit" x="9" y="2" default="true" radius="1.5"/>
  <Prop name="Stalagmite" x="4" y="4"/>
</Scene>"#;

    fn invalid_location(error: SceneLoadError) -> (String, SourceLocation) {
        match error {
            SceneLoadError::Invalid {
                message, location, ..
            } => (message, location),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn parses_player_checkpoints_and_props_in_order() {
        let def = parse_scene_document("cave_chapter2", CAVE).expect("parse");
        assert_eq!(def.id, "cave_chapter2");
        assert_eq!(def.player_spawn, Vec2::ZERO);
        assert_eq!(def.entities.len(), 3);
        assert_eq!(
            def.entities[1],
            EntityDef::Checkpoint {
                name: "CP_Exit".to_string(),
                explicit_id: None,
                position: Vec2::new(9.0, 2.0),
                is_default_for_scene: true,
                trigger_radius: Some(1.5),
            }
        );
    }

    #[test]
    fn instantiate_resolves_marker_identifiers() {
        let def = parse_scene_document("cave_chapter2", CAVE).expect("parse");
        let world = def.instantiate(1.0);
        let markers = world
            .checkpoint_markers()
            .map(|(_, marker)| {
                (
                    marker.identifier().to_string(),
                    marker.is_default_for_scene(),
                    marker.trigger_radius(),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            markers,
            vec![
                ("CP_Entrance".to_string(), false, 1.0),
                ("CP_Exit".to_string(), true, 1.5),
            ]
        );
        assert_eq!(world.entity_count(), 4);
        assert!(world.player_id().is_some());
    }

    #[test]
    fn missing_player_is_rejected() {
        let error = parse_scene_document("empty", "<Scene><Prop name=\"Rock\"/></Scene>")
            .expect_err("should fail");
        let (message, _) = invalid_location(error);
        assert!(message.contains("<Player>"), "{message}");
    }

    #[test]
    fn duplicate_player_reports_location() {
        let raw = "<Scene>\n  <Player/>\n  <Player/>\n</Scene>";
        let (message, location) =
            invalid_location(parse_scene_document("twice", raw).expect_err("should fail"));
        assert!(message.contains("duplicate <Player>"), "{message}");
        assert_eq!(location, SourceLocation { line: 3, column: 3 });
    }

    #[test]
    fn unknown_element_and_attribute_are_rejected() {
        let element = parse_scene_document("s", "<Scene><Player/><Enemy/></Scene>")
            .expect_err("element");
        assert!(invalid_location(element).0.contains("unknown element <Enemy>"));

        let attribute = parse_scene_document("s", "<Scene><Player hp=\"3\"/></Scene>")
            .expect_err("attribute");
        assert!(invalid_location(attribute).0.contains("unknown attribute 'hp'"));
    }

    #[test]
    fn checkpoint_requires_name_and_valid_values() {
        let nameless = parse_scene_document("s", "<Scene><Player/><Checkpoint id=\"CP\"/></Scene>")
            .expect_err("name");
        assert!(invalid_location(nameless).0.contains("'name'"));

        let bad_bool = parse_scene_document(
            "s",
            "<Scene><Player/><Checkpoint name=\"CP\" default=\"yes\"/></Scene>",
        )
        .expect_err("bool");
        assert!(invalid_location(bad_bool).0.contains("true or false"));

        let bad_x = parse_scene_document(
            "s",
            "<Scene><Player/><Checkpoint name=\"CP\" x=\"north\"/></Scene>",
        )
        .expect_err("x");
        assert!(invalid_location(bad_x).0.contains("finite number"));

        let bad_radius = parse_scene_document(
            "s",
            "<Scene><Player/><Checkpoint name=\"CP\" radius=\"0\"/></Scene>",
        )
        .expect_err("radius");
        assert!(invalid_location(bad_radius).0.contains("positive"));
    }

    #[test]
    fn malformed_xml_reports_position() {
        let error = parse_scene_document("s", "<Scene>\n<Player>\n</Scene>").expect_err("xml");
        let (message, location) = invalid_location(error);
        assert!(message.starts_with("malformed XML"), "{message}");
        assert!(location.line >= 2);
    }

    #[test]
    fn wrong_root_is_rejected() {
        let error = parse_scene_document("s", "<Level><Player/></Level>").expect_err("root");
        assert!(invalid_location(error).0.contains("<Scene>"));
    }

    #[test]
    fn discover_indexes_xml_files_by_stem() {
        let temp = TempDir::new().expect("temp");
        fs::write(temp.path().join("forest_chapter1.xml"), "<Scene><Player/></Scene>")
            .expect("forest");
        fs::write(temp.path().join("cave_chapter2.XML"), "<Scene><Player/></Scene>")
            .expect("cave");
        fs::write(temp.path().join("notes.txt"), "ignored").expect("notes");

        let catalog = SceneCatalog::discover(temp.path()).expect("discover");
        assert_eq!(
            catalog.scene_ids().collect::<Vec<_>>(),
            vec!["cave_chapter2", "forest_chapter1"]
        );
        assert!(catalog
            .read_source("forest_chapter1")
            .expect("read")
            .contains("<Player/>"));
    }

    #[test]
    fn discover_fails_for_missing_directory() {
        let temp = TempDir::new().expect("temp");
        let error = SceneCatalog::discover(&temp.path().join("nope")).expect_err("missing");
        assert!(matches!(error, SceneLoadError::ReadDir { .. }));
    }

    #[test]
    fn unknown_scene_is_an_error() {
        let catalog = SceneCatalog::default();
        assert!(matches!(
            catalog.read_source("void"),
            Err(SceneLoadError::UnknownScene { .. })
        ));
    }
}
