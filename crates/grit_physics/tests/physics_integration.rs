//! Integration tests for the collision mesh to simulation pipeline
//!
//! These tests drive the public API the way a game would:
//! 1. Resources are loaded by name and shared between bodies
//! 2. Contacts and queries report the material that was touched
//! 3. Per-part settings survive mesh reloads
//! 4. Scatter placement stays on the requested material

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use grit_col::MaterialDb;
use grit_math::{Transform, Vector3};
use grit_physics::{
    scatter_rng, CollisionEvent, DiskSource, Interaction, InteractionMatrix, MemorySource, PhysicsConfig,
    PhysicsError, PhysicsWorld, ScatterParams, SweepHits,
};

const GROUND: &str = r#"TCOL1.0
    attributes { static; }
    trimesh {
        vertexes { -20 -20 0; 20 -20 0; 20 20 0; -20 20 0; }
        faces { 0 1 2 "mat"; 0 2 3 "mat"; }
    }"#;

const BALL: &str = r#"TCOL1.0 attributes { mass 1; } compound { sphere { material "rubber"; radius 0.5; } }"#;

// Two spheres on one static body, one above the other
const TOWER: &str = r#"TCOL1.0
    attributes { static; }
    compound {
        sphere { material "mat"; radius 1; centre 0 0 1; }
        sphere { material "rubber"; radius 1; centre 0 0 4; }
    }"#;

fn materials() -> MaterialDb {
    let mut db = MaterialDb::new();
    db.add("mat", 1).unwrap();
    db.add("rubber", 2).unwrap();
    db
}

fn world() -> PhysicsWorld {
    let src = MemorySource::new()
        .with("ground.tcol", GROUND)
        .with("ball.tcol", BALL)
        .with("tower.tcol", TOWER);
    PhysicsWorld::new(PhysicsConfig::default(), materials(), src)
}

fn pump_seconds(world: &mut PhysicsWorld, seconds: u32) {
    // stay under the per-pump step cap and keep half a step of slack
    for _ in 0..seconds * 10 {
        world.pump(0.1 + world.step_size() * 0.5);
    }
}

fn down_ray(world: &PhysicsWorld, x: f32, y: f32) -> SweepHits {
    let mut hits = SweepHits::default();
    world.ray(Vector3::new(x, y, 10.0), Vector3::new(x, y, -10.0), -1.0, &mut hits);
    hits
}

// ==================== Contact Tests ====================

/// A ball dropped on the ground reports the ground's material
#[test]
fn test_ball_lands_on_material() {
    let mut w = world();
    let ground = w.create_body("ground.tcol", Transform::IDENTITY).unwrap();
    let ball = w.create_body("ball.tcol", Transform::from_position(Vector3::new(3.0, -2.0, 2.0))).unwrap();

    let events: Rc<RefCell<Vec<CollisionEvent>>> = Rc::new(RefCell::new(Vec::new()));
    let e = events.clone();
    w.set_collision_callback(ball, move |_, _, event| {
        e.borrow_mut().push(*event);
        Ok(())
    })
    .unwrap();

    pump_seconds(&mut w, 2);

    let mat = w.materials().get_material("mat").unwrap().id;
    let rubber = w.materials().get_material("rubber").unwrap().id;
    let events = events.borrow();
    assert!(!events.is_empty(), "ball never touched the ground");
    for event in events.iter() {
        assert_eq!(event.other, Some(ground));
        assert_eq!(event.material, rubber);
        assert_eq!(event.other_material, mat);
        // the ball sits above the ground, so the normal out of it points down
        assert!(event.normal.z < -0.9, "normal {:?}", event.normal);
    }

    let z = w.body(ball).unwrap().position().z;
    assert!((z - 0.5).abs() < 0.05, "ball rests at z = {}", z);
    assert_eq!(w.anomaly_count(), 0);

    w.destroy_body(ball).unwrap();
    w.destroy_body(ground).unwrap();
}

/// The smallest useful resource: one static triangle
#[test]
fn test_sphere_rests_on_single_triangle() {
    let triangle = r#"TCOL1.0 attributes { static; } trimesh { vertexes{0 0 0; 1 0 0; 0 1 0;} faces{0 1 2 "mat";} }"#;
    let src = MemorySource::new().with("tri.tcol", triangle).with("ball.tcol", BALL);
    let mut w = PhysicsWorld::new(PhysicsConfig::default(), materials(), src);
    let tri = w.create_body("tri.tcol", Transform::IDENTITY).unwrap();
    let ball = w.create_body("ball.tcol", Transform::from_position(Vector3::new(0.25, 0.25, 1.5))).unwrap();

    let touched = Rc::new(RefCell::new(None));
    let t = touched.clone();
    w.set_collision_callback(ball, move |world, _, event| {
        *t.borrow_mut() = Some(world.materials().name_of(event.other_material).to_string());
        Ok(())
    })
    .unwrap();

    pump_seconds(&mut w, 2);
    assert_eq!(touched.borrow().as_deref(), Some("mat"));
    assert!(w.body(ball).unwrap().position().z > 0.4);

    w.destroy_body(ball).unwrap();
    w.destroy_body(tri).unwrap();
}

/// Steps run in whole increments and the count is capped per pump
#[test]
fn test_pump_step_counts() {
    let mut w = world();
    let step = w.step_size();
    assert_eq!(w.pump(step * 0.5), 0);
    assert_eq!(w.pump(step * 3.5), 3);
    assert_eq!(w.pump(step * 1000.0), w.config().max_steps as usize);
}

// ==================== Part Tests ====================

/// A disabled part drops out of queries and comes back with its offset
#[test]
fn test_disabled_part_is_ignored_by_rays() {
    let mut w = world();
    let tower = w.create_body("tower.tcol", Transform::IDENTITY).unwrap();
    let rubber = w.materials().get_material("rubber").unwrap().id;
    let mat = w.materials().get_material("mat").unwrap().id;

    assert_eq!(down_ray(&w, 0.0, 0.0).nearest().map(|h| h.material), Some(rubber));

    {
        let mut body = w.body_mut(tower).unwrap();
        body.set_element_offset(1, Transform::from_position(Vector3::new(5.0, 0.0, 0.0))).unwrap();
        body.set_element_enabled(1, false).unwrap();
    }
    w.pump(w.step_size() * 1.5);
    let hits = down_ray(&w, 0.0, 0.0);
    assert_eq!(hits.hits.len(), 1);
    assert_eq!(hits.hits[0].material, mat);
    assert!(down_ray(&w, 5.0, 0.0).hits.is_empty());

    w.body_mut(tower).unwrap().set_element_enabled(1, true).unwrap();
    w.pump(w.step_size() * 1.5);
    assert_eq!(down_ray(&w, 5.0, 0.0).nearest().map(|h| h.material), Some(rubber));
    assert_eq!(down_ray(&w, 0.0, 0.0).nearest().map(|h| h.material), Some(mat));

    let part = *w.body(tower).unwrap().part(1).unwrap();
    assert!(part.enabled);
    assert_eq!(part.offset.position, Vector3::new(5.0, 0.0, 0.0));
    w.destroy_body(tower).unwrap();
}

#[test]
fn test_part_index_checked() {
    let mut w = world();
    let tower = w.create_body("tower.tcol", Transform::IDENTITY).unwrap();
    assert!(matches!(
        w.body_mut(tower).unwrap().set_element_enabled(2, false),
        Err(PhysicsError::ElementOutOfRange { index: 2, count: 2 })
    ));
    w.destroy_body(tower).unwrap();
}

// ==================== Reload Tests ====================

struct TempDir(PathBuf);

impl TempDir {
    fn new(tag: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("gritphys-{}-{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

/// Reloading rebuilds the bodies, keeps their overrides and survives a bad file
#[test]
fn test_reload_keeps_part_overrides() {
    let dir = TempDir::new("reload");
    fs::write(dir.0.join("tower.tcol"), TOWER).unwrap();
    let mut w = PhysicsWorld::new(PhysicsConfig::default(), materials(), DiskSource::new(&dir.0));
    let tower = w.create_body("tower.tcol", Transform::IDENTITY).unwrap();
    w.body_mut(tower).unwrap().set_element_enabled(0, false).unwrap();

    // the top sphere becomes a box
    let edited = r#"TCOL1.0
        attributes { static; }
        compound {
            sphere { material "mat"; radius 1; centre 0 0 1; }
            box { material "mat"; dimensions 2 2 2; centre 0 0 4; }
        }"#;
    fs::write(dir.0.join("tower.tcol"), edited).unwrap();
    w.reload_mesh("tower.tcol").unwrap();
    w.pump(w.step_size() * 1.5);

    let body = w.body(tower).unwrap();
    assert!(body.is_bound());
    assert!(!body.part(0).unwrap().enabled);
    let mat = w.materials().get_material("mat").unwrap().id;
    let hits = down_ray(&w, 0.0, 0.0);
    assert_eq!(hits.hits.len(), 1);
    assert_eq!(hits.hits[0].material, mat);

    // a broken resource leaves the body out of the world until fixed
    fs::write(dir.0.join("tower.tcol"), "TCOL1.0 attributes {").unwrap();
    assert!(w.reload_mesh("tower.tcol").is_err());
    assert!(!w.body(tower).map_or(false, |b| b.is_bound()));
    assert!(down_ray(&w, 0.0, 0.0).hits.is_empty());

    fs::write(dir.0.join("tower.tcol"), TOWER).unwrap();
    w.reload_mesh("tower.tcol").unwrap();
    assert!(w.body(tower).unwrap().is_bound());
    assert!(!w.body(tower).unwrap().part(0).unwrap().enabled);
    w.destroy_body(tower).unwrap();
}

// ==================== Material Tests ====================

#[test]
fn test_interaction_lookup_is_symmetric() {
    let mut w = world();
    let mut matrix = InteractionMatrix::new(3, Interaction::new(0.5, 0.0));
    matrix.set(1, 2, Interaction::new(0.9, 0.3));
    w.set_interactions(matrix);

    let mat = w.materials().get_material("mat").unwrap().id;
    let rubber = w.materials().get_material("rubber").unwrap().id;
    assert_eq!(w.friction_restitution(mat, rubber), (0.9, 0.3));
    assert_eq!(w.friction_restitution(rubber, mat), (0.9, 0.3));
    assert_eq!(w.friction_restitution(mat, mat), (0.5, 0.0));
}

/// Highest point a dropped ball reaches after its first bounce
fn bounce_peak(restitution: f32) -> f32 {
    let mut w = world();
    let mut matrix = InteractionMatrix::new(3, Interaction::new(0.5, 0.0));
    matrix.set(1, 2, Interaction::new(0.5, restitution));
    w.set_interactions(matrix);
    let ground = w.create_body("ground.tcol", Transform::IDENTITY).unwrap();
    let ball = w.create_body("ball.tcol", Transform::from_position(Vector3::new(3.0, -2.0, 2.5))).unwrap();

    let mut lowest = f32::MAX;
    let mut peak = f32::MIN;
    for _ in 0..300 {
        w.pump(w.step_size() * 2.5);
        let z = w.body(ball).unwrap().position().z;
        if z <= lowest {
            lowest = z;
        } else {
            peak = peak.max(z);
        }
    }
    w.destroy_body(ball).unwrap();
    w.destroy_body(ground).unwrap();
    peak
}

/// The matrix restitution reaches the solver's contacts
#[test]
fn test_restitution_comes_from_matrix() {
    let dead = bounce_peak(0.0);
    let lively = bounce_peak(1.0);
    assert!(dead < 0.7, "dead ball rose to {}", dead);
    assert!(lively > 1.5, "lively ball rose to {}", lively);
}

/// Friction from the matrix stops a sliding ball, a frictionless pair does not
#[test]
fn test_friction_comes_from_matrix() {
    let slide = |friction: f32| {
        let mut w = world();
        let mut matrix = InteractionMatrix::new(3, Interaction::new(0.0, 0.0));
        matrix.set(1, 2, Interaction::new(friction, 0.0));
        w.set_interactions(matrix);
        let ground = w.create_body("ground.tcol", Transform::IDENTITY).unwrap();
        let ball = w.create_body("ball.tcol", Transform::from_position(Vector3::new(-10.0, 0.0, 0.5))).unwrap();
        w.body_mut(ball).unwrap().set_linear_velocity(Vector3::new(4.0, 0.0, 0.0));
        pump_seconds(&mut w, 1);
        let x = w.body(ball).unwrap().position().x;
        w.destroy_body(ball).unwrap();
        w.destroy_body(ground).unwrap();
        x
    };
    // without friction the ball keeps its speed for the whole second
    assert!(slide(0.0) > -6.5);
    // with friction it starts rolling and loses part of its speed
    assert!(slide(1.0) < slide(0.0) - 0.5);
}

// Dynamic triangle mesh plate, front face up
const PLATE: &str = r#"TCOL1.0
    attributes { mass 50; }
    trimesh {
        vertexes { -2 -2 0; 2 -2 0; 2 2 0; -2 2 0; }
        faces { 0 1 2 "mat"; 0 2 3 "mat"; }
    }"#;

/// A ball thrown at the front of a dynamic triangle mesh stays in front of it
#[test]
fn test_dynamic_trimesh_front_face_holds() {
    let src = MemorySource::new().with("plate.tcol", PLATE).with("ball.tcol", BALL);
    let mut w = PhysicsWorld::new(PhysicsConfig::default(), materials(), src);
    w.set_gravity(Vector3::ZERO);
    let plate = w.create_body("plate.tcol", Transform::IDENTITY).unwrap();
    let ball = w.create_body("ball.tcol", Transform::from_position(Vector3::new(0.3, 0.2, 2.0))).unwrap();
    w.body_mut(ball).unwrap().set_linear_velocity(Vector3::new(0.0, 0.0, -3.0));

    let touched = Rc::new(RefCell::new(0usize));
    let t = touched.clone();
    w.set_collision_callback(ball, move |_, _, event| {
        if event.other == Some(plate) {
            *t.borrow_mut() += 1;
        }
        Ok(())
    })
    .unwrap();

    pump_seconds(&mut w, 2);
    assert!(*touched.borrow() > 0, "ball never reached the plate");
    let gap = w.body(ball).unwrap().position().z - w.body(plate).unwrap().position().z;
    assert!(gap > 0.4, "ball ended {} from the plate", gap);
    assert_eq!(w.anomaly_count(), 0);

    w.destroy_body(ball).unwrap();
    w.destroy_body(plate).unwrap();
}

// ==================== Scatter Tests ====================

#[test]
fn test_scatter_over_ground() {
    let mut w = world();
    w.load_mesh("ground.tcol").unwrap();
    let mat = w.materials().get_material("mat").unwrap().id;
    let ground = w.mesh("ground.tcol").unwrap();
    assert!((ground.material_area(mat) - 1600.0).abs() < 1e-2);

    let params = ScatterParams { density: 0.25, ..ScatterParams::default() };
    let placed = ground.scatter(mat, &Transform::IDENTITY, &params, &mut scatter_rng(Some(1)));
    assert_eq!(placed.len(), 400);
    for t in &placed {
        assert!(t.position.x.abs() <= 20.0 && t.position.y.abs() <= 20.0);
        assert!(t.position.z.abs() < 1e-4);
    }

    // nothing is placed on a material the mesh does not use
    let rubber = w.materials().get_material("rubber").unwrap().id;
    assert!(ground.scatter(rubber, &Transform::IDENTITY, &params, &mut scatter_rng(Some(1))).is_empty());
}
