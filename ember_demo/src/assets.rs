//! Model and texture loading for the demo

use ember_engine::ember::resource::{Mesh, TextureData};
use ember_engine::{engine_info, engine_warn};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for asset loading.
#[derive(Error, Debug)]
pub enum AssetError {
    /// Failed to load a glTF file.
    #[error("Failed to load glTF file '{path}': {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },

    /// glTF file contains no triangle primitives.
    #[error("glTF file '{0}' contains no triangle meshes")]
    NoMeshes(PathBuf),

    /// A mesh primitive has no position data.
    #[error("Mesh primitive has no position data")]
    NoPositionData,

    /// Image loading error.
    #[error("Failed to load image '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Geometry or pixels rejected by the engine.
    #[error("Invalid asset: {0}")]
    Invalid(#[from] ember_engine::ember::Error),
}

pub type AssetResult<T> = Result<T, AssetError>;

/// Load every triangle primitive of a .gltf/.glb file into one mesh
pub fn load_model(path: &Path) -> AssetResult<Mesh> {
    let (document, buffers, _images) = gltf::import(path).map_err(|source| AssetError::Gltf {
        path: path.to_path_buf(),
        source,
    })?;
    let mesh = mesh_from_document(&document, &buffers)?
        .ok_or_else(|| AssetError::NoMeshes(path.to_path_buf()))?;

    engine_info!(
        "ember_demo::assets",
        "Loaded '{}' ({} vertices, {} triangles)",
        path.display(),
        mesh.vertices.len(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Merge the triangle primitives of `document`, or `None` if it has none
pub fn mesh_from_document(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
) -> AssetResult<Option<Mesh>> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    for primitive in document.meshes().flat_map(|mesh| mesh.primitives()) {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            engine_warn!(
                "ember_demo::assets",
                "Skipping primitive with mode {:?}",
                primitive.mode()
            );
            continue;
        }

        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));
        let primitive_positions: Vec<[f32; 3]> = reader
            .read_positions()
            .ok_or(AssetError::NoPositionData)?
            .collect();
        let base = positions.len() as u32;
        let count = primitive_positions.len();

        match reader.read_tex_coords(0) {
            Some(coords) => uvs.extend(coords.into_f32()),
            None => uvs.extend(std::iter::repeat([0.0, 0.0]).take(count)),
        }

        match reader.read_indices() {
            Some(read) => indices.extend(read.into_u32().map(|i| base + i)),
            None => indices.extend(base..base + count as u32),
        }

        positions.extend(primitive_positions);
    }

    if positions.is_empty() {
        return Ok(None);
    }

    Ok(Some(Mesh::from_streams(&positions, Some(&uvs), indices)?))
}

/// Load an image file as RGBA8
pub fn load_texture(path: &Path) -> AssetResult<TextureData> {
    let image = image::open(path).map_err(|source| AssetError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let texture = texture_from_image(image)?;

    engine_info!(
        "ember_demo::assets",
        "Loaded '{}' ({}x{})",
        path.display(),
        texture.width(),
        texture.height()
    );
    Ok(texture)
}

pub fn texture_from_image(image: image::DynamicImage) -> AssetResult<TextureData> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(TextureData::from_rgba8(width, height, rgba.into_raw())?)
}

/// The model at `path`, or a unit cube when none is given
pub fn model_or_default(path: Option<&Path>) -> AssetResult<Mesh> {
    match path {
        Some(path) => load_model(path),
        None => {
            engine_info!("ember_demo::assets", "No model given, drawing a cube");
            Ok(Mesh::cube())
        }
    }
}

/// The texture at `path`, or a checkerboard when none is given
pub fn texture_or_default(path: Option<&Path>) -> AssetResult<TextureData> {
    match path {
        Some(path) => load_texture(path),
        None => Ok(TextureData::checkerboard(
            256,
            32,
            [235, 235, 235, 255],
            [200, 60, 40, 255],
        )),
    }
}

#[cfg(test)]
#[path = "assets_tests.rs"]
mod tests;
