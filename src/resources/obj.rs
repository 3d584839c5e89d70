//! Parser for the Wavefront-style mesh (`.obj`) and material (`.mtl`) text formats.
//!
//! Parsing never fails. Lines that cannot be understood are skipped, and face
//! references that point outside the collected pools are replaced by fixed
//! defaults, so partially broken geometry still produces a drawable mesh.
//!
//! Only the first three references of an `f` line are consumed; there is no
//! fan triangulation of larger polygons.

use crate::data_structures::model::{MaterialRecord, MeshRecord, VertexLayout};

/// Emitted for a face reference whose position index is out of range.
pub const MISSING_POSITION: [f32; 3] = [0.0, 0.0, 0.0];
/// Emitted for an out-of-range secondary attribute in the colored layout.
/// Bright orange, so broken references are easy to spot on screen.
pub const MISSING_COLOR: [f32; 3] = [1.0, 0.5, 0.0];
/// Emitted for an out-of-range texture coordinate in the textured layout.
pub const MISSING_UV: [f32; 2] = [0.0, 0.0];

/// Geometry pools collected by the first pass over a mesh file.
#[derive(Debug, Default)]
struct Pools {
    positions: Vec<[f32; 3]>,
    /// `vt` triples, used either as texture coordinates or as packed colors.
    secondary: Vec<[f32; 3]>,
    /// Collected for completeness; nothing downstream consumes normals.
    normals: Vec<[f32; 3]>,
    /// Material names in the order their `usemtl` directives appear.
    materials_used: Vec<String>,
}

impl Pools {
    fn collect(text: &str) -> Self {
        let mut pools = Pools::default();
        for line in text.lines() {
            let mut parts = line.split_whitespace();
            match parts.next() {
                Some("v") => {
                    if let Some(p) = coords::<3>(parts, 2) {
                        pools.positions.push(p);
                    }
                }
                Some("vt") => {
                    if let Some(t) = coords::<3>(parts, 1) {
                        pools.secondary.push(t);
                    }
                }
                Some("vn") => {
                    if let Some(n) = coords::<3>(parts, 3) {
                        pools.normals.push(n);
                    }
                }
                Some("usemtl") => {
                    if let Some(name) = parts.next() {
                        pools.materials_used.push(name.to_string());
                    }
                }
                _ => (),
            }
        }
        log::debug!(
            "collected {} positions, {} secondary attributes, {} normals",
            pools.positions.len(),
            pools.secondary.len(),
            pools.normals.len()
        );
        pools
    }

    fn position(&self, r: &FaceRef) -> [f32; 3] {
        r.position
            .and_then(|i| self.positions.get(i).copied())
            .unwrap_or(MISSING_POSITION)
    }

    fn color(&self, r: &FaceRef) -> [f32; 3] {
        r.secondary
            .and_then(|i| self.secondary.get(i).copied())
            .unwrap_or(MISSING_COLOR)
    }

    fn uv(&self, r: &FaceRef) -> [f32; 2] {
        r.secondary
            .and_then(|i| self.secondary.get(i))
            .map(|t| [t[0], t[1]])
            .unwrap_or(MISSING_UV)
    }
}

/// Reads up to `N` floats. The first `required` must be present; the rest
/// default to zero. Any token that is not a number rejects the whole line.
fn coords<'a, const N: usize>(
    mut parts: impl Iterator<Item = &'a str>,
    required: usize,
) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    for (i, slot) in out.iter_mut().enumerate() {
        match parts.next() {
            Some(token) => *slot = token.parse().ok()?,
            None if i >= required => break,
            None => return None,
        }
    }
    Some(out)
}

/// One `pos[/tex[/norm]]` reference, converted to 0-based indices.
/// `None` marks a missing, unparsable or non-positive index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FaceRef {
    position: Option<usize>,
    secondary: Option<usize>,
}

impl FaceRef {
    fn parse(token: &str) -> Self {
        let mut fields = token.split('/');
        let position = fields.next().and_then(one_based);
        let secondary = fields.next().and_then(one_based);
        Self {
            position,
            secondary,
        }
    }
}

fn one_based(field: &str) -> Option<usize> {
    match field.parse::<i64>() {
        Ok(i) if i >= 1 => Some((i - 1) as usize),
        _ => None,
    }
}

/// Second pass: the first three references of every `f` line, in file order.
fn faces(text: &str) -> impl Iterator<Item = [FaceRef; 3]> + '_ {
    text.lines().enumerate().filter_map(|(line_no, line)| {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("f") {
            return None;
        }
        let refs: Vec<&str> = parts.collect();
        if refs.len() < 3 {
            log::debug!(
                "skipping face on line {} with only {} references",
                line_no + 1,
                refs.len()
            );
            return None;
        }
        if refs.len() > 3 {
            log::debug!(
                "face on line {} has {} references; dropping all but the first three",
                line_no + 1,
                refs.len()
            );
        }
        Some([
            FaceRef::parse(refs[0]),
            FaceRef::parse(refs[1]),
            FaceRef::parse(refs[2]),
        ])
    })
}

/// Parse a mesh into the colored layout: 6 floats (position + `vt` triple)
/// per vertex, 3 vertices per face.
pub fn parse_mesh(text: &str) -> MeshRecord {
    let pools = Pools::collect(text);
    let mut vertices = Vec::new();
    for face in faces(text) {
        for r in &face {
            vertices.extend_from_slice(&pools.position(r));
            vertices.extend_from_slice(&pools.color(r));
        }
    }
    let mesh = MeshRecord::new(vertices, VertexLayout::PositionColor);
    log::debug!("parsed colored mesh with {} vertices", mesh.vertex_count);
    mesh
}

/// Result of [`parse_mesh_with_texture`].
#[derive(Clone, Debug, PartialEq)]
pub struct TexturedMesh {
    pub mesh: MeshRecord,
    /// Diffuse texture picked by [`select_diffuse_texture`].
    pub texture_path: Option<String>,
}

/// Parse a mesh into the textured layout: 5 floats (position + uv) per vertex.
///
/// The bounds policy matches [`parse_mesh`] except that a missing texture
/// coordinate becomes [`MISSING_UV`]. The whole mesh is drawn with a single
/// texture, chosen from `materials` by [`select_diffuse_texture`].
pub fn parse_mesh_with_texture(text: &str, materials: &[MaterialRecord]) -> TexturedMesh {
    let pools = Pools::collect(text);
    let mut vertices = Vec::new();
    for face in faces(text) {
        for r in &face {
            vertices.extend_from_slice(&pools.position(r));
            vertices.extend_from_slice(&pools.uv(r));
        }
    }
    let mesh = MeshRecord::new(vertices, VertexLayout::PositionUv);
    log::debug!("parsed textured mesh with {} vertices", mesh.vertex_count);
    TexturedMesh {
        mesh,
        texture_path: select_diffuse_texture(materials, &pools.materials_used),
    }
}

/// Picks the texture for a single-texture model.
///
/// The first material named by a `usemtl` directive that has a diffuse map
/// wins. If none of the referenced materials has one, the first material in
/// library order with a diffuse map is used.
pub fn select_diffuse_texture(
    materials: &[MaterialRecord],
    materials_used: &[String],
) -> Option<String> {
    let referenced = materials_used.iter().find_map(|name| {
        materials
            .iter()
            .find(|m| &m.name == name)
            .and_then(|m| m.diffuse_texture.clone())
    });
    referenced.or_else(|| materials.iter().find_map(|m| m.diffuse_texture.clone()))
}

/// Directory part of `url`, including the trailing separator. Empty when
/// `url` has no separator.
pub fn base_dir(url: &str) -> &str {
    match url.rfind('/') {
        Some(i) => &url[..=i],
        None => "",
    }
}

/// Finds the first `mtllib` directive and resolves it next to `asset_url`.
pub fn extract_material_lib_reference(text: &str, asset_url: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let rest = line.strip_prefix("mtllib")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let name = rest.trim();
        if name.is_empty() {
            return None;
        }
        Some(format!("{}{}", base_dir(asset_url), name))
    })
}

/// Resolves a `map_Kd` path found in a library whose directory is `lib_dir`.
///
/// Plain paths are appended to `lib_dir`. A path starting with `../` does not
/// follow normal directory walking: the last two segments of `lib_dir` (split
/// on `/`, so the empty segment after the trailing separator counts as one)
/// are removed and the remainder of the path, without its `../`, is appended.
/// `models/mtl/` + `../tex.png` therefore yields `models/tex.png`.
pub fn resolve_diffuse_path(lib_dir: &str, path: &str) -> String {
    match path.strip_prefix("../") {
        Some(rest) => {
            let segments: Vec<&str> = lib_dir.split('/').collect();
            let keep = segments.len().saturating_sub(2);
            format!("{}/{}", segments[..keep].join("/"), rest)
        }
        None => format!("{lib_dir}{path}"),
    }
}

/// Parses `newmtl` blocks, keeping library order. A repeated `newmtl` name
/// resets that material in place.
pub fn parse_material_lib(text: &str, lib_url: &str) -> Vec<MaterialRecord> {
    let lib_dir = base_dir(lib_url);
    let mut materials: Vec<MaterialRecord> = Vec::new();
    let mut current: Option<usize> = None;

    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let Some(directive) = parts.next() else {
            continue;
        };
        if directive.eq_ignore_ascii_case("newmtl") {
            current = parts.next().map(|name| {
                match materials.iter().position(|m| m.name == name) {
                    Some(idx) => {
                        materials[idx].diffuse_texture = None;
                        idx
                    }
                    None => {
                        materials.push(MaterialRecord {
                            name: name.to_string(),
                            diffuse_texture: None,
                        });
                        materials.len() - 1
                    }
                }
            });
        } else if directive.eq_ignore_ascii_case("map_kd") {
            let Some(idx) = current else {
                continue;
            };
            let path = parts.collect::<Vec<_>>().join(" ");
            if path.is_empty() {
                continue;
            }
            let resolved = resolve_diffuse_path(lib_dir, &path);
            log::debug!("material {} uses diffuse map {}", materials[idx].name, resolved);
            materials[idx].diffuse_texture = Some(resolved);
        }
    }
    materials
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vt 1.0 0.0 0.0
vt 0.0 1.0 0.0
vt 0.0 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1
";

    #[test]
    fn triangle_produces_eighteen_floats() {
        let mesh = parse_mesh(TRIANGLE);
        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(
            mesh.vertices,
            vec![
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, 0.0, 1.0,
            ]
        );
    }

    #[test]
    fn out_of_range_references_use_defaults() {
        let mesh = parse_mesh("v 1 2 3\nvt 0.1 0.2 0.3\nf 9/1 1/7 1/1\n");
        assert_eq!(&mesh.vertices[0..3], &MISSING_POSITION);
        assert_eq!(&mesh.vertices[3..6], &[0.1, 0.2, 0.3]);
        assert_eq!(&mesh.vertices[6..9], &[1.0, 2.0, 3.0]);
        assert_eq!(&mesh.vertices[9..12], &MISSING_COLOR);
    }

    #[test]
    fn missing_secondary_reference_uses_highlight() {
        let mesh = parse_mesh("v 1 1 1\nf 1 1 1\n");
        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(&mesh.vertices[3..6], &MISSING_COLOR);
    }

    #[test]
    fn only_first_three_references_are_used() {
        let quad = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = parse_mesh(quad);
        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(&mesh.vertices[12..15], &[1.0, 1.0, 0.0]);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let text = "v 1 2 3\nv nope 2 3\nv 4\nf 1 1\nf 1 2 3\ngarbage\n";
        let mesh = parse_mesh(text);
        // one usable face, and the broken `v` lines did not enter the pool
        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(&mesh.vertices[0..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&mesh.vertices[6..9], &MISSING_POSITION);
    }

    #[test]
    fn position_without_z_defaults_to_zero() {
        let mesh = parse_mesh("v 1 2\nf 1 1 1\n");
        assert_eq!(&mesh.vertices[0..3], &[1.0, 2.0, 0.0]);
    }

    #[test]
    fn zero_and_negative_indices_are_out_of_range() {
        let mesh = parse_mesh("v 5 5 5\nvt 1 1 1\nf 0/0 -1/-1 1/1\n");
        assert_eq!(&mesh.vertices[0..6], &[0.0, 0.0, 0.0, 1.0, 0.5, 0.0]);
        assert_eq!(&mesh.vertices[6..12], &[0.0, 0.0, 0.0, 1.0, 0.5, 0.0]);
        assert_eq!(&mesh.vertices[12..18], &[5.0, 5.0, 5.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn textured_variant_emits_five_floats_per_vertex() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nf 1/1 2/2 3/5\n";
        let textured = parse_mesh_with_texture(text, &[]);
        assert_eq!(textured.mesh.layout, VertexLayout::PositionUv);
        assert_eq!(textured.mesh.vertex_count, 3);
        assert_eq!(textured.mesh.vertices.len(), 15);
        assert_eq!(&textured.mesh.vertices[5..10], &[1.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(&textured.mesh.vertices[13..15], &MISSING_UV);
        assert_eq!(textured.texture_path, None);
    }

    #[test]
    fn material_lib_reference_is_resolved_next_to_the_mesh() {
        let text = "# comment\nmtllib square.mtl\nv 0 0 0\n";
        assert_eq!(
            extract_material_lib_reference(text, "./models/square.obj"),
            Some("./models/square.mtl".to_string())
        );
        assert_eq!(
            extract_material_lib_reference(text, "square.obj"),
            Some("square.mtl".to_string())
        );
        assert_eq!(extract_material_lib_reference("v 0 0 0\n", "a/b.obj"), None);
        assert_eq!(extract_material_lib_reference("mtllibx y\n", "a/b.obj"), None);
    }

    #[test]
    fn parent_relative_diffuse_path_drops_two_segments() {
        assert_eq!(resolve_diffuse_path("models/mtl/", "../tex.png"), "models/tex.png");
        assert_eq!(resolve_diffuse_path("models/mtl/", "tex.png"), "models/mtl/tex.png");
        assert_eq!(resolve_diffuse_path("", "../tex.png"), "/tex.png");
    }

    #[test]
    fn material_lib_collects_diffuse_maps_in_order() {
        let mtl = "\
newmtl plain
Kd 1 1 1
newmtl wood
map_Kd ../textures/wood grain.png
newmtl stone
MAP_KD stone.png
";
        let materials = parse_material_lib(mtl, "models/mtl/scene.mtl");
        assert_eq!(materials.len(), 3);
        assert_eq!(materials[0].diffuse_texture, None);
        assert_eq!(
            materials[1].diffuse_texture.as_deref(),
            Some("models/textures/wood grain.png")
        );
        assert_eq!(
            materials[2].diffuse_texture.as_deref(),
            Some("models/mtl/stone.png")
        );
    }

    #[test]
    fn repeated_newmtl_resets_in_place() {
        let mtl = "newmtl a\nmap_Kd a.png\nnewmtl b\nmap_Kd b.png\nnewmtl a\n";
        let materials = parse_material_lib(mtl, "lib.mtl");
        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0].name, "a");
        assert_eq!(materials[0].diffuse_texture, None);
    }

    #[test]
    fn diffuse_map_before_any_material_is_ignored() {
        assert!(parse_material_lib("map_Kd lost.png\n", "lib.mtl").is_empty());
    }

    #[test]
    fn referenced_material_wins_over_file_order() {
        let materials = vec![
            MaterialRecord {
                name: "first".into(),
                diffuse_texture: Some("first.png".into()),
            },
            MaterialRecord {
                name: "used".into(),
                diffuse_texture: Some("used.png".into()),
            },
        ];
        let text = "v 0 0 0\nusemtl used\nf 1 1 1\n";
        let textured = parse_mesh_with_texture(text, &materials);
        assert_eq!(textured.texture_path.as_deref(), Some("used.png"));
    }

    #[test]
    fn falls_back_to_first_material_with_a_diffuse_map() {
        let materials = vec![
            MaterialRecord {
                name: "bare".into(),
                diffuse_texture: None,
            },
            MaterialRecord {
                name: "mapped".into(),
                diffuse_texture: Some("mapped.png".into()),
            },
        ];
        assert_eq!(
            select_diffuse_texture(&materials, &["bare".to_string()]).as_deref(),
            Some("mapped.png")
        );
        assert_eq!(
            select_diffuse_texture(&materials, &[]).as_deref(),
            Some("mapped.png")
        );
    }
}
