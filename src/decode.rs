use crate::error::DecodeError;
use crate::mesh::{compute_normals, Material, Mesh, MeshVertex};
use glam::{Vec2, Vec3};
use std::io::Read;

/// Where the uniform model scale must be applied. The rig-interchange
/// decoder ignores root-level scale, so its output is scaled per mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalePlacement {
    Root,
    PerMesh,
}

#[derive(Debug, Clone)]
pub struct DecodedMesh {
    pub name: Option<String>,
    pub mesh: Mesh,
    pub material: Material,
}

#[derive(Debug, Clone)]
pub struct DecodedModel {
    pub meshes: Vec<DecodedMesh>,
}

pub struct DecodeContext<'a> {
    pub asset: &'a str,
    /// Companion material-library bytes (wavefront only), if resolved.
    pub companion: Option<&'a [u8]>,
}

/// One capability per format: decode a byte stream into renderable meshes.
/// The loading pipeline never special-cases a format beyond selecting which
/// implementation to call.
pub trait MeshDecoder {
    fn decode(&self, bytes: &[u8], ctx: &DecodeContext<'_>) -> Result<DecodedModel, DecodeError>;

    fn scale_placement(&self) -> ScalePlacement {
        ScalePlacement::Root
    }

    /// Companion file name this format may want resolved alongside the
    /// asset (the wavefront material library).
    fn companion_name(&self, _asset: &str) -> Option<String> {
        None
    }
}

pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["stl", "glb", "gltf", "obj", "fbx", "3mf"];

/// Decoder selection by lowercase file extension. Closed set.
pub fn decoder_for(extension: &str) -> Option<&'static dyn MeshDecoder> {
    match extension {
        "stl" => Some(&StlDecoder),
        "glb" | "gltf" => Some(&GltfDecoder),
        "obj" => Some(&ObjDecoder),
        "fbx" => Some(&FbxDecoder),
        "3mf" => Some(&ThreeMfDecoder),
        _ => None,
    }
}

fn soup_mesh(positions: Vec<Vec3>, indices: Vec<u32>) -> Mesh {
    let normals = compute_normals(&positions, &indices);
    let vertices: Vec<MeshVertex> = positions
        .iter()
        .zip(normals.iter())
        .map(|(pos, normal)| MeshVertex::new(*pos, *normal, Vec2::ZERO))
        .collect();
    Mesh::new(vertices, indices)
}

// ---------------------------------------------------------------------------
// STL: binary and ascii triangulated meshes
// ---------------------------------------------------------------------------

pub struct StlDecoder;

impl MeshDecoder for StlDecoder {
    fn decode(&self, bytes: &[u8], ctx: &DecodeContext<'_>) -> Result<DecodedModel, DecodeError> {
        let mesh = if looks_like_ascii_stl(bytes) {
            decode_ascii_stl(bytes, ctx.asset)?
        } else {
            decode_binary_stl(bytes, ctx.asset)?
        };
        Ok(DecodedModel {
            meshes: vec![DecodedMesh { name: None, mesh, material: Material::default() }],
        })
    }
}

fn looks_like_ascii_stl(bytes: &[u8]) -> bool {
    // Binary exports sometimes start with "solid" too; require a facet
    // keyword in the early body before committing to the text path.
    let head = &bytes[..bytes.len().min(1024)];
    let Ok(text) = std::str::from_utf8(head) else {
        return false;
    };
    text.trim_start().starts_with("solid") && (text.contains("facet") || text.contains("endsolid"))
}

fn decode_ascii_stl(bytes: &[u8], asset: &str) -> Result<Mesh, DecodeError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| DecodeError::new(asset, "ascii stl is not valid utf-8"))?;
    let mut positions = Vec::new();
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("vertex") {
            continue;
        }
        let mut component = |axis: &str| -> Result<f32, DecodeError> {
            parts
                .next()
                .and_then(|value| value.parse::<f32>().ok())
                .ok_or_else(|| DecodeError::new(asset, format!("bad vertex {axis} component")))
        };
        let x = component("x")?;
        let y = component("y")?;
        let z = component("z")?;
        positions.push(Vec3::new(x, y, z));
    }
    if positions.is_empty() || positions.len() % 3 != 0 {
        return Err(DecodeError::new(asset, "ascii stl does not contain whole triangles"));
    }
    let indices = (0..positions.len() as u32).collect();
    Ok(soup_mesh(positions, indices))
}

fn decode_binary_stl(bytes: &[u8], asset: &str) -> Result<Mesh, DecodeError> {
    if bytes.len() < 84 {
        return Err(DecodeError::new(asset, "binary stl shorter than its header"));
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    let expected = 84 + count * 50;
    if bytes.len() < expected {
        return Err(DecodeError::new(
            asset,
            format!("binary stl truncated: {} triangles declared, {} bytes present", count, bytes.len()),
        ));
    }
    if count == 0 {
        return Err(DecodeError::new(asset, "binary stl declares zero triangles"));
    }
    let mut positions = Vec::with_capacity(count * 3);
    let read_f32 = |offset: usize| {
        f32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
    };
    for tri in 0..count {
        let base = 84 + tri * 50 + 12; // skip the stored facet normal
        for vertex in 0..3 {
            let at = base + vertex * 12;
            positions.push(Vec3::new(read_f32(at), read_f32(at + 4), read_f32(at + 8)));
        }
    }
    let indices = (0..positions.len() as u32).collect();
    Ok(soup_mesh(positions, indices))
}

// ---------------------------------------------------------------------------
// Wavefront OBJ with optional companion material library
// ---------------------------------------------------------------------------

pub struct ObjDecoder;

impl MeshDecoder for ObjDecoder {
    fn decode(&self, bytes: &[u8], ctx: &DecodeContext<'_>) -> Result<DecodedModel, DecodeError> {
        let mut reader = std::io::BufReader::new(bytes);
        let options =
            tobj::LoadOptions { triangulate: true, single_index: true, ..Default::default() };
        let companion = ctx.companion;
        let asset = ctx.asset.to_string();
        let (models, materials) = tobj::load_obj_buf(&mut reader, &options, move |_path| {
            match companion {
                Some(mtl_bytes) => {
                    match tobj::load_mtl_buf(&mut std::io::BufReader::new(mtl_bytes)) {
                        Ok(loaded) => Ok(loaded),
                        // A broken material library skips the material,
                        // not the model.
                        Err(err) => {
                            log::warn!("material library for '{asset}' unreadable: {err}");
                            Ok((Vec::new(), ahash::AHashMap::new()))
                        }
                    }
                }
                None => Ok((Vec::new(), ahash::AHashMap::new())),
            }
        })
        .map_err(|err| DecodeError::new(ctx.asset, err.to_string()))?;
        let materials = materials.unwrap_or_default();

        let mut meshes = Vec::with_capacity(models.len());
        for model in models {
            let raw = model.mesh;
            if raw.positions.len() < 9 {
                continue;
            }
            let positions: Vec<Vec3> =
                raw.positions.chunks_exact(3).map(|p| Vec3::new(p[0], p[1], p[2])).collect();
            let normals: Vec<Vec3> = if raw.normals.len() == raw.positions.len() {
                raw.normals.chunks_exact(3).map(|n| Vec3::new(n[0], n[1], n[2])).collect()
            } else {
                compute_normals(&positions, &raw.indices)
            };
            let vertices: Vec<MeshVertex> = positions
                .iter()
                .enumerate()
                .map(|(i, pos)| {
                    let uv = raw
                        .texcoords
                        .get(i * 2..i * 2 + 2)
                        .map(|t| Vec2::new(t[0], t[1]))
                        .unwrap_or(Vec2::ZERO);
                    MeshVertex::new(*pos, normals[i], uv)
                })
                .collect();
            let material = raw
                .material_id
                .and_then(|id| materials.get(id))
                .and_then(|mat| mat.diffuse)
                .map(|rgb| Material::solid(Vec3::from_array(rgb)))
                .unwrap_or_default();
            meshes.push(DecodedMesh {
                name: Some(model.name.clone()),
                mesh: Mesh::new(vertices, raw.indices),
                material,
            });
        }
        if meshes.is_empty() {
            return Err(DecodeError::new(ctx.asset, "obj contains no triangle geometry"));
        }
        Ok(DecodedModel { meshes })
    }

    fn companion_name(&self, asset: &str) -> Option<String> {
        let (base, _) = asset.rsplit_once('.')?;
        Some(format!("{base}.mtl"))
    }
}

// ---------------------------------------------------------------------------
// glTF / GLB
// ---------------------------------------------------------------------------

pub struct GltfDecoder;

impl MeshDecoder for GltfDecoder {
    fn decode(&self, bytes: &[u8], ctx: &DecodeContext<'_>) -> Result<DecodedModel, DecodeError> {
        let (document, buffers, _images) = gltf::import_slice(bytes)
            .map_err(|err| DecodeError::new(ctx.asset, err.to_string()))?;
        let mut meshes = Vec::new();
        for gltf_mesh in document.meshes() {
            for (primitive_index, primitive) in gltf_mesh.primitives().enumerate() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    continue;
                }
                let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
                let Some(positions_iter) = reader.read_positions() else {
                    continue;
                };
                let positions: Vec<Vec3> = positions_iter.map(Vec3::from_array).collect();
                if positions.is_empty() {
                    continue;
                }
                let indices: Vec<u32> = reader
                    .read_indices()
                    .map(|read| read.into_u32().collect())
                    .unwrap_or_else(|| (0..positions.len() as u32).collect());
                let normals: Vec<Vec3> = reader
                    .read_normals()
                    .map(|it| it.map(Vec3::from_array).collect())
                    .filter(|normals: &Vec<Vec3>| normals.len() == positions.len())
                    .unwrap_or_else(|| compute_normals(&positions, &indices));
                let tex_coords: Vec<Vec2> = reader
                    .read_tex_coords(0)
                    .map(|coords| coords.into_f32().map(Vec2::from_array).collect())
                    .unwrap_or_default();
                let vertices: Vec<MeshVertex> = positions
                    .iter()
                    .enumerate()
                    .map(|(i, pos)| {
                        let uv = tex_coords.get(i).copied().unwrap_or(Vec2::ZERO);
                        MeshVertex::new(*pos, normals[i], uv)
                    })
                    .collect();
                let base_color = primitive.material().pbr_metallic_roughness().base_color_factor();
                let name = gltf_mesh
                    .name()
                    .map(|mesh_name| format!("{mesh_name}::{primitive_index}"))
                    .or_else(|| Some(format!("primitive_{primitive_index}")));
                meshes.push(DecodedMesh {
                    name,
                    mesh: Mesh::new(vertices, indices),
                    material: Material { base_color, ..Material::default() },
                });
            }
        }
        if meshes.is_empty() {
            return Err(DecodeError::new(ctx.asset, "gltf contains no triangle primitives"));
        }
        Ok(DecodedModel { meshes })
    }
}

// ---------------------------------------------------------------------------
// Binary FBX: geometry extraction only
// ---------------------------------------------------------------------------

pub struct FbxDecoder;

const FBX_MAGIC: &[u8] = b"Kaydara FBX Binary  \x00\x1a\x00";

impl MeshDecoder for FbxDecoder {
    fn decode(&self, bytes: &[u8], ctx: &DecodeContext<'_>) -> Result<DecodedModel, DecodeError> {
        let document = FbxReader::new(bytes, ctx.asset)?.read_document()?;
        let objects = document
            .iter()
            .find(|node| node.name == "Objects")
            .ok_or_else(|| DecodeError::new(ctx.asset, "fbx has no Objects node"))?;
        let mut meshes = Vec::new();
        for geometry in objects.children.iter().filter(|child| child.name == "Geometry") {
            let Some(vertices) = geometry.child_f64_array("Vertices") else {
                continue;
            };
            let Some(polygons) = geometry.child_i32_array("PolygonVertexIndex") else {
                continue;
            };
            let positions: Vec<Vec3> = vertices
                .chunks_exact(3)
                .map(|p| Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32))
                .collect();
            let indices = triangulate_polygons(polygons, positions.len(), ctx.asset)?;
            if indices.is_empty() {
                continue;
            }
            meshes.push(DecodedMesh {
                name: geometry.first_string().map(str::to_string),
                mesh: soup_indexed(positions, indices),
                material: Material::default(),
            });
        }
        if meshes.is_empty() {
            return Err(DecodeError::new(ctx.asset, "fbx contains no polygon geometry"));
        }
        Ok(DecodedModel { meshes })
    }

    /// This decoder ignores root-level scale; the pipeline applies the
    /// uniform scale to every mesh node instead.
    fn scale_placement(&self) -> ScalePlacement {
        ScalePlacement::PerMesh
    }
}

fn soup_indexed(positions: Vec<Vec3>, indices: Vec<u32>) -> Mesh {
    let normals = compute_normals(&positions, &indices);
    let vertices: Vec<MeshVertex> = positions
        .iter()
        .zip(normals.iter())
        .map(|(pos, normal)| MeshVertex::new(*pos, *normal, Vec2::ZERO))
        .collect();
    Mesh::new(vertices, indices)
}

/// Polygon rings arrive as index runs where the final index of each ring is
/// bitwise-negated; rings are fan-triangulated.
fn triangulate_polygons(raw: &[i32], vertex_count: usize, asset: &str) -> Result<Vec<u32>, DecodeError> {
    let mut indices = Vec::with_capacity(raw.len() * 2);
    let mut ring: Vec<u32> = Vec::with_capacity(8);
    for &value in raw {
        let (index, closes) = if value < 0 { ((!value) as u32, true) } else { (value as u32, false) };
        if index as usize >= vertex_count {
            return Err(DecodeError::new(asset, "fbx polygon index out of range"));
        }
        ring.push(index);
        if closes {
            for i in 1..ring.len().saturating_sub(1) {
                indices.extend_from_slice(&[ring[0], ring[i], ring[i + 1]]);
            }
            ring.clear();
        }
    }
    Ok(indices)
}

#[derive(Debug, Default)]
struct FbxNode {
    name: String,
    f64_arrays: Vec<Vec<f64>>,
    i32_arrays: Vec<Vec<i32>>,
    strings: Vec<String>,
    children: Vec<FbxNode>,
}

impl FbxNode {
    fn child_f64_array(&self, name: &str) -> Option<&[f64]> {
        self.children
            .iter()
            .find(|child| child.name == name)
            .and_then(|child| child.f64_arrays.first())
            .map(Vec::as_slice)
    }

    fn child_i32_array(&self, name: &str) -> Option<&[i32]> {
        self.children
            .iter()
            .find(|child| child.name == name)
            .and_then(|child| child.i32_arrays.first())
            .map(Vec::as_slice)
    }

    fn first_string(&self) -> Option<&str> {
        self.strings.first().map(String::as_str)
    }
}

struct FbxReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    asset: &'a str,
    /// Documents at version 7500+ switch the node record fields to 64 bits.
    wide: bool,
}

impl<'a> FbxReader<'a> {
    fn new(bytes: &'a [u8], asset: &'a str) -> Result<Self, DecodeError> {
        if bytes.len() < 27 || &bytes[..23] != FBX_MAGIC {
            return Err(DecodeError::new(asset, "not a binary fbx document"));
        }
        let version = u32::from_le_bytes([bytes[23], bytes[24], bytes[25], bytes[26]]);
        Ok(Self { bytes, pos: 27, asset, wide: version >= 7500 })
    }

    fn error(&self, reason: &str) -> DecodeError {
        DecodeError::new(self.asset, reason)
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(count).filter(|end| *end <= self.bytes.len());
        let Some(end) = end else {
            return Err(self.error("fbx truncated"));
        };
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_offset(&mut self) -> Result<u64, DecodeError> {
        if self.wide {
            let bytes = self.take(8)?;
            Ok(u64::from_le_bytes(bytes.try_into().map_err(|_| self.error("fbx truncated"))?))
        } else {
            Ok(u64::from(self.read_u32()?))
        }
    }

    fn sentinel_size(&self) -> usize {
        if self.wide {
            25
        } else {
            13
        }
    }

    fn read_document(&mut self) -> Result<Vec<FbxNode>, DecodeError> {
        let mut nodes = Vec::new();
        while self.pos + self.sentinel_size() <= self.bytes.len() {
            match self.read_node()? {
                Some(node) => nodes.push(node),
                None => break,
            }
        }
        Ok(nodes)
    }

    fn read_node(&mut self) -> Result<Option<FbxNode>, DecodeError> {
        let end_offset = self.read_offset()?;
        let num_props = self.read_offset()?;
        let _prop_list_len = self.read_offset()?;
        let name_len = self.read_u8()? as usize;
        if end_offset == 0 {
            // Null record terminating a child list.
            return Ok(None);
        }
        let name = std::str::from_utf8(self.take(name_len)?)
            .map_err(|_| self.error("fbx node name is not utf-8"))?
            .to_string();
        let mut node = FbxNode { name, ..FbxNode::default() };
        for _ in 0..num_props {
            self.read_property(&mut node)?;
        }
        let end = end_offset as usize;
        while self.pos + self.sentinel_size() <= end {
            match self.read_node()? {
                Some(child) => node.children.push(child),
                None => break,
            }
        }
        if end > self.bytes.len() {
            return Err(self.error("fbx node overruns the document"));
        }
        self.pos = end;
        Ok(Some(node))
    }

    fn read_property(&mut self, node: &mut FbxNode) -> Result<(), DecodeError> {
        let code = self.read_u8()?;
        match code {
            b'Y' => {
                self.take(2)?;
            }
            b'C' => {
                self.take(1)?;
            }
            b'I' | b'F' => {
                self.take(4)?;
            }
            b'D' | b'L' => {
                self.take(8)?;
            }
            b'S' | b'R' => {
                let len = self.read_u32()? as usize;
                let raw = self.take(len)?;
                if code == b'S' {
                    if let Ok(text) = std::str::from_utf8(raw) {
                        node.strings.push(text.to_string());
                    }
                }
            }
            b'f' | b'd' | b'i' | b'l' | b'b' => {
                let data = self.read_array_payload(code)?;
                match code {
                    b'd' => node.f64_arrays.push(
                        data.chunks_exact(8)
                            .map(|c| f64::from_le_bytes(c.try_into().unwrap_or([0; 8])))
                            .collect(),
                    ),
                    b'f' => node.f64_arrays.push(
                        data.chunks_exact(4)
                            .map(|c| f32::from_le_bytes(c.try_into().unwrap_or([0; 4])) as f64)
                            .collect(),
                    ),
                    b'i' => node.i32_arrays.push(
                        data.chunks_exact(4)
                            .map(|c| i32::from_le_bytes(c.try_into().unwrap_or([0; 4])))
                            .collect(),
                    ),
                    _ => {}
                }
            }
            other => {
                return Err(self.error(&format!("unknown fbx property code {other:#x}")));
            }
        }
        Ok(())
    }

    fn read_array_payload(&mut self, code: u8) -> Result<Vec<u8>, DecodeError> {
        let length = self.read_u32()? as usize;
        let encoding = self.read_u32()?;
        let compressed_len = self.read_u32()? as usize;
        let element_size = match code {
            b'b' => 1,
            b'f' | b'i' => 4,
            _ => 8,
        };
        if encoding == 0 {
            Ok(self.take(length * element_size)?.to_vec())
        } else {
            let compressed = self.take(compressed_len)?;
            let mut out = Vec::with_capacity(length * element_size);
            flate2::read::ZlibDecoder::new(compressed)
                .read_to_end(&mut out)
                .map_err(|err| self.error(&format!("fbx array inflate failed: {err}")))?;
            Ok(out)
        }
    }
}

// ---------------------------------------------------------------------------
// 3MF: zip container with an XML model part
// ---------------------------------------------------------------------------

pub struct ThreeMfDecoder;

impl MeshDecoder for ThreeMfDecoder {
    fn decode(&self, bytes: &[u8], ctx: &DecodeContext<'_>) -> Result<DecodedModel, DecodeError> {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
            .map_err(|err| DecodeError::new(ctx.asset, format!("not a 3mf container: {err}")))?;
        let model_name = archive
            .file_names()
            .find(|name| name.ends_with(".model"))
            .map(str::to_string)
            .ok_or_else(|| DecodeError::new(ctx.asset, "3mf container has no model part"))?;
        let mut xml = String::new();
        archive
            .by_name(&model_name)
            .map_err(|err| DecodeError::new(ctx.asset, err.to_string()))?
            .read_to_string(&mut xml)
            .map_err(|err| DecodeError::new(ctx.asset, format!("model part unreadable: {err}")))?;

        let mut meshes = Vec::new();
        for (object_index, object) in split_tag_sections(&xml, "object").into_iter().enumerate() {
            let mut positions = Vec::new();
            for tag in scan_tags(object, "vertex") {
                let x = tag_attr_f32(tag, "x");
                let y = tag_attr_f32(tag, "y");
                let z = tag_attr_f32(tag, "z");
                match (x, y, z) {
                    (Some(x), Some(y), Some(z)) => positions.push(Vec3::new(x, y, z)),
                    _ => return Err(DecodeError::new(ctx.asset, "3mf vertex missing a coordinate")),
                }
            }
            let mut indices = Vec::new();
            for tag in scan_tags(object, "triangle") {
                for attr in ["v1", "v2", "v3"] {
                    let index = tag_attr_f32(tag, attr)
                        .map(|value| value as u32)
                        .ok_or_else(|| DecodeError::new(ctx.asset, "3mf triangle missing an index"))?;
                    if index as usize >= positions.len() {
                        return Err(DecodeError::new(ctx.asset, "3mf triangle index out of range"));
                    }
                    indices.push(index);
                }
            }
            if positions.is_empty() || indices.is_empty() {
                continue;
            }
            meshes.push(DecodedMesh {
                name: Some(format!("object_{object_index}")),
                mesh: soup_indexed(positions, indices),
                material: Material::default(),
            });
        }
        if meshes.is_empty() {
            return Err(DecodeError::new(ctx.asset, "3mf model part contains no mesh objects"));
        }
        Ok(DecodedModel { meshes })
    }
}

/// Slices the XML into per-`<object>` sections so indices stay local to the
/// object that owns them.
fn split_tag_sections<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut sections = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let body = &rest[start..];
        let end = body.find(&close).map(|at| at + close.len()).unwrap_or(body.len());
        sections.push(&body[..end]);
        rest = &body[end..];
    }
    sections
}

fn scan_tags<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{tag}");
    let mut tags = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        // Require a name boundary so `<vertex` does not match `<vertices>`.
        let is_boundary = after.chars().next().map(|c| !c.is_ascii_alphanumeric()).unwrap_or(true);
        if !is_boundary {
            rest = after;
            continue;
        }
        let end = after.find('>').map(|at| at + 1).unwrap_or(after.len());
        tags.push(&rest[start..start + open.len() + end]);
        rest = &after[end..];
    }
    tags
}

fn tag_attr_f32(tag: &str, name: &str) -> Option<f32> {
    let needle = format!("{name}=\"");
    let mut search = tag;
    loop {
        let at = search.find(&needle)?;
        // Reject longer attribute names sharing this suffix.
        let preceded_ok = at == 0
            || search[..at].ends_with(char::is_whitespace)
            || search[..at].ends_with('<');
        let value_start = at + needle.len();
        if preceded_ok {
            let value = &search[value_start..];
            let end = value.find('"')?;
            return value[..end].parse::<f32>().ok();
        }
        search = &search[value_start..];
    }
}
