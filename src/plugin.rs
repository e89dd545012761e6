use std::sync::Arc;

use bevy::{
    asset::RenderAssetUsages,
    mesh::{Indices, PrimitiveTopology},
    prelude::*,
    tasks::{AsyncComputeTaskPool, Task, block_on, futures_lite::future},
};
use tracing::error;

use crate::{
    assemble::NormalMode,
    error::Result,
    extract::{GridRequest, extract_isosurface},
    field::ScalarField,
    mesh::IsoMesh,
};

/// System sets for the isosurface pipeline.
///
/// Use these to order your own systems relative to mesh generation:
///
/// ```rust,ignore
/// // Run after geometry is ready but before it's uploaded, e.g. for collider generation:
/// app.add_systems(Update, build_collider.after(IsosurfaceSet::Generate)
///                                       .before(IsosurfaceSet::Upload));
/// ```
///
/// ```text
/// IsosurfaceSet::Spawn  →  [async compute]  →  IsosurfaceSet::Generate  →  [your systems]  →  IsosurfaceSet::Upload
/// ```
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum IsosurfaceSet {
    /// Spawns an async compute task for each queued source.
    Spawn,
    /// Polls async tasks and inserts [`GeneratedMesh`] on completion.
    Generate,
    /// Moves [`GeneratedMesh`] data into a Bevy [`Mesh3d`] and removes [`GeneratedMesh`].
    Upload,
}

/// A scalar field to polygonize, and how.
///
/// The field sits behind an [`Arc`] so the async task can share it with the entity.
#[derive(Component, Clone)]
#[require(Transform)]
pub struct IsosurfaceSource {
    pub field: Arc<dyn ScalarField + Send + Sync>,
    pub request: GridRequest,
}

impl IsosurfaceSource {
    pub fn new(field: impl ScalarField + Send + Sync + 'static, request: GridRequest) -> Self {
        Self {
            field: Arc::new(field),
            request,
        }
    }
}

/// Marker component added to [`IsosurfaceSource`] entities waiting to be processed.
///
/// Removed once the mesh has been uploaded, or when extraction fails.
#[derive(Component)]
pub struct QueuedSource;

/// Holds the in-flight async compute task for an [`IsosurfaceSource`].
#[derive(Component)]
pub struct ComputeTask(Task<Result<GeneratedMesh>>);

/// Extracted mesh data in the layout Bevy's [`Mesh`] wants.
///
/// Lives on the entity between [`IsosurfaceSet::Generate`] and [`IsosurfaceSet::Upload`].
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct GeneratedMesh {
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl From<IsoMesh> for GeneratedMesh {
    /// Meshes without normals get topological ones.
    fn from(mut mesh: IsoMesh) -> Self {
        if mesh.normals.len() != mesh.vertices.len() {
            mesh.create_normals();
        }
        Self {
            vertices: mesh.vertices.iter().map(|p| [p.x, p.y, p.z]).collect(),
            normals: mesh.normals.iter().map(|n| [n.x, n.y, n.z]).collect(),
            indices: mesh.faces.iter().flatten().map(|&v| v as u32).collect(),
        }
    }
}

/// Runtime configuration for the isosurface pipeline.
///
/// Inserted as a resource by [`IsosurfacePlugin`]. Modify it at any time to change behaviour:
///
/// ```rust,ignore
/// app.add_plugins(IsosurfacePlugin { max_tasks_per_frame: 8 });
///
/// fn my_system(mut config: ResMut<IsosurfaceConfig>) {
///     config.max_tasks_per_frame = 1;
/// }
/// ```
#[derive(Resource)]
pub struct IsosurfaceConfig {
    /// Maximum number of async extraction tasks spawned per frame. Default: `4`.
    pub max_tasks_per_frame: usize,
}

impl Default for IsosurfaceConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_frame: 4,
        }
    }
}

/// Bevy plugin that turns [`IsosurfaceSource`]s into rendered meshes.
///
/// Extraction runs on Bevy's `AsyncComputeTaskPool`, so the main thread is never
/// blocked. With the `auto_queue` feature, sources are queued whenever they are added
/// or changed; otherwise insert [`QueuedSource`] yourself.
///
/// ```text
/// IsosurfaceSource added or changed
///   → QueuedSource inserted         (queue_changed_sources, auto_queue only)
///   → ComputeTask spawned           (IsosurfaceSet::Spawn)
///   → [async compute runs]
///   → GeneratedMesh inserted        (IsosurfaceSet::Generate, once task completes)
///   → [your collider systems here]
///   → Mesh3d inserted               (IsosurfaceSet::Upload)
///   → QueuedSource + GeneratedMesh removed
/// ```
pub struct IsosurfacePlugin {
    /// Initial value for [`IsosurfaceConfig::max_tasks_per_frame`].
    pub max_tasks_per_frame: usize,
}

impl Default for IsosurfacePlugin {
    fn default() -> Self {
        Self {
            max_tasks_per_frame: IsosurfaceConfig::default().max_tasks_per_frame,
        }
    }
}

impl Plugin for IsosurfacePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(IsosurfaceConfig {
            max_tasks_per_frame: self.max_tasks_per_frame,
        })
        .configure_sets(
            Update,
            (
                IsosurfaceSet::Spawn,
                IsosurfaceSet::Generate,
                IsosurfaceSet::Upload,
            )
                .chain(),
        )
        .add_systems(
            Update,
            (
                spawn_extraction_tasks.in_set(IsosurfaceSet::Spawn),
                poll_extraction_tasks.in_set(IsosurfaceSet::Generate),
                upload_mesh.in_set(IsosurfaceSet::Upload),
            ),
        );

        #[cfg(feature = "auto_queue")]
        app.add_systems(
            Update,
            queue_changed_sources.before(IsosurfaceSet::Spawn),
        );
    }
}

/// Inserts [`QueuedSource`] on every added or changed [`IsosurfaceSource`].
#[cfg(feature = "auto_queue")]
fn queue_changed_sources(
    mut commands: Commands,
    query: Query<Entity, (Changed<IsosurfaceSource>, Without<QueuedSource>)>,
) {
    for entity in query.iter() {
        commands.entity(entity).insert(QueuedSource);
    }
}

/// Spawns async extraction tasks for [`QueuedSource`]s, up to
/// [`IsosurfaceConfig::max_tasks_per_frame`] per frame.
fn spawn_extraction_tasks(
    mut commands: Commands,
    config: Res<IsosurfaceConfig>,
    query: Query<(Entity, &IsosurfaceSource), (With<QueuedSource>, Without<ComputeTask>)>,
) {
    let task_pool = AsyncComputeTaskPool::get();

    for (entity, source) in query.iter().take(config.max_tasks_per_frame) {
        let field = Arc::clone(&source.field);
        let request = source.request;

        let task = task_pool.spawn(async move { build_mesh(field.as_ref(), &request) });

        commands.entity(entity).insert(ComputeTask(task));
    }
}

/// Extracts the isosurface and converts it for upload.
///
/// Bevy lights the side a triangle winds towards, which is uphill in the field, while
/// gradient normals point downhill; they are flipped here so the two agree.
fn build_mesh(field: &(dyn ScalarField + Send + Sync), request: &GridRequest) -> Result<GeneratedMesh> {
    let mut mesh = extract_isosurface(field, request)?;
    if request.normals == NormalMode::Gradient {
        for n in &mut mesh.normals {
            *n = -*n;
        }
    }
    Ok(mesh.into())
}

/// Polls in-flight [`ComputeTask`]s each frame and inserts [`GeneratedMesh`] on completion.
///
/// Non-blocking: tasks that haven't finished are skipped and retried next frame.
fn poll_extraction_tasks(mut commands: Commands, mut query: Query<(Entity, &mut ComputeTask)>) {
    for (entity, mut compute_task) in query.iter_mut() {
        let Some(result) = block_on(future::poll_once(&mut compute_task.0)) else {
            continue;
        };
        match result {
            Ok(generated_mesh) => {
                commands
                    .entity(entity)
                    .insert(generated_mesh)
                    .remove::<ComputeTask>();
            }
            Err(err) => {
                error!(?entity, %err, "isosurface extraction failed");
                commands
                    .entity(entity)
                    .remove::<(ComputeTask, QueuedSource)>();
            }
        }
    }
}

/// Moves a [`GeneratedMesh`] into a Bevy [`Mesh3d`], then removes [`GeneratedMesh`] and
/// [`QueuedSource`].
fn upload_mesh(
    mut commands: Commands,
    mut query: Query<(Entity, &mut GeneratedMesh), With<QueuedSource>>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    for (entity, mut generated) in query.iter_mut() {
        let generated = std::mem::take(&mut *generated);
        let mut bevy_mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::RENDER_WORLD,
        );

        bevy_mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, generated.vertices);
        bevy_mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, generated.normals);
        bevy_mesh.insert_indices(Indices::U32(generated.indices));

        commands
            .entity(entity)
            .insert(Mesh3d(meshes.add(bevy_mesh)))
            .remove::<(QueuedSource, GeneratedMesh)>();
    }
}
