//! Canonical TCOL output
//!
//! The printed form always spells out every field, so re-parsing it gives
//! back an identical [`TColFile`]. Reals use f32 `Display`, which is the
//! shortest string that reads back to the same value.

use std::fmt::Write;

use grit_math::{Quaternion, Vector3};

use crate::material::{MaterialDb, MaterialId};
use crate::parser::TCOL_HEADER;
use crate::tcol::{TColFile, TColShape, TColTriMesh};

const INDENT: &str = "    ";

/// Render a document as TCOL text
pub fn pretty_print(file: &TColFile, db: &MaterialDb) -> String {
    let mut p = Printer { out: String::new(), db };
    p.file(file);
    p.out
}

struct Printer<'a> {
    out: String,
    db: &'a MaterialDb,
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

impl Printer<'_> {
    // Writing into a String cannot fail
    fn line(&mut self, depth: usize, args: std::fmt::Arguments<'_>) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        let _ = self.out.write_fmt(args);
        self.out.push('\n');
    }

    fn material(&self, id: MaterialId) -> String {
        format!("\"{}\"", escape(self.db.name_of(id)))
    }

    fn file(&mut self, file: &TColFile) {
        self.line(0, format_args!("{}", TCOL_HEADER));
        self.out.push('\n');

        self.line(0, format_args!("attributes {{"));
        if file.is_static() {
            self.line(1, format_args!("static;"));
        } else {
            self.line(1, format_args!("mass {};", file.mass));
            if let Some(i) = file.inertia {
                self.line(1, format_args!("inertia {};", v3(i)));
            }
        }
        self.line(1, format_args!("linear_damping {};", file.linear_damping));
        self.line(1, format_args!("angular_damping {};", file.angular_damping));
        self.line(1, format_args!("linear_sleep_threshold {};", file.linear_sleep_threshold));
        self.line(1, format_args!("angular_sleep_threshold {};", file.angular_sleep_threshold));
        self.line(1, format_args!("ccd_motion_threshold {};", file.ccd_motion_threshold));
        self.line(1, format_args!("ccd_swept_sphere_radius {};", file.ccd_swept_sphere_radius));
        self.line(0, format_args!("}}"));

        if let Some(compound) = &file.compound {
            self.out.push('\n');
            self.line(0, format_args!("compound {{"));
            for shape in &compound.shapes {
                self.shape(shape);
            }
            self.line(0, format_args!("}}"));
        }

        if let Some(trimesh) = &file.trimesh {
            self.out.push('\n');
            self.trimesh(trimesh);
        }
    }

    fn shape(&mut self, shape: &TColShape) {
        self.line(1, format_args!("{} {{", shape.keyword()));
        self.line(2, format_args!("margin {};", shape.margin()));
        let mat = self.material(shape.material());
        self.line(2, format_args!("material {};", mat));
        match shape {
            TColShape::Hull(h) => {
                self.line(2, format_args!("vertexes {{"));
                for v in &h.vertexes {
                    self.line(3, format_args!("{};", v3(*v)));
                }
                self.line(2, format_args!("}}"));
            }
            TColShape::Box(b) => {
                self.line(2, format_args!("centre {};", v3(b.centre)));
                self.line(2, format_args!("orientation {};", quat(b.orientation)));
                self.line(2, format_args!("dimensions {};", v3(b.dimensions)));
            }
            TColShape::Cylinder(c) => {
                self.line(2, format_args!("centre {};", v3(c.centre)));
                self.line(2, format_args!("orientation {};", quat(c.orientation)));
                self.line(2, format_args!("dimensions {};", v3(c.dimensions)));
            }
            TColShape::Cone(c) => {
                self.line(2, format_args!("centre {};", v3(c.centre)));
                self.line(2, format_args!("orientation {};", quat(c.orientation)));
                self.line(2, format_args!("radius {};", c.radius));
                self.line(2, format_args!("height {};", c.height));
            }
            TColShape::Plane(p) => {
                self.line(2, format_args!("normal {};", v3(p.normal)));
                self.line(2, format_args!("distance {};", p.distance));
            }
            TColShape::Sphere(s) => {
                self.line(2, format_args!("centre {};", v3(s.centre)));
                self.line(2, format_args!("radius {};", s.radius));
            }
        }
        self.line(1, format_args!("}}"));
    }

    fn trimesh(&mut self, t: &TColTriMesh) {
        self.line(0, format_args!("trimesh {{"));
        self.line(1, format_args!("margin {};", t.margin));
        self.line(1, format_args!("vertexes {{"));
        for v in &t.vertexes {
            self.line(2, format_args!("{};", v3(*v)));
        }
        self.line(1, format_args!("}}"));
        self.line(1, format_args!("faces {{"));
        for f in &t.faces {
            let mat = self.material(f.material);
            self.line(2, format_args!("{} {} {} {};", f.v1, f.v2, f.v3, mat));
        }
        self.line(1, format_args!("}}"));
        self.line(0, format_args!("}}"));
    }
}

fn v3(v: Vector3) -> String {
    format!("{} {} {}", v.x, v.y, v.z)
}

fn quat(q: Quaternion) -> String {
    format!("{} {} {} {}", q.w, q.x, q.y, q.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_tcol;
    use crate::tcol::{TColCompound, TColFace, TColHull, TColPlane, TColSphere, TColBox};

    fn db() -> MaterialDb {
        let mut db = MaterialDb::new();
        db.add("/pmat/Stone", 1).unwrap();
        db.add("odd \"quoted\" name", 2).unwrap();
        db
    }

    fn sample() -> TColFile {
        TColFile {
            mass: 12.5,
            inertia: Some(Vector3::new(0.1, 0.2, 0.3)),
            linear_damping: 0.15,
            angular_damping: 0.33,
            linear_sleep_threshold: 0.8,
            angular_sleep_threshold: 1.0,
            ccd_motion_threshold: 0.05,
            ccd_swept_sphere_radius: 0.025,
            compound: Some(TColCompound {
                shapes: vec![
                    TColShape::Hull(TColHull {
                        material: 1,
                        margin: 0.04,
                        vertexes: vec![
                            Vector3::new(-1.0, -1.0, -1.0),
                            Vector3::new(1.0, -1.0, -1.0),
                            Vector3::new(0.0, 1.0, -1.0),
                            Vector3::new(0.0, 0.0, 1.0 / 3.0),
                        ],
                    }),
                    TColShape::Box(TColBox {
                        material: 2,
                        margin: 0.0,
                        centre: Vector3::new(0.5, 0.25, -7.0),
                        orientation: Quaternion::new(0.70710677, 0.0, 0.0, 0.70710677),
                        dimensions: Vector3::new(1.0, 2.0, 3.0),
                    }),
                    TColShape::Plane(TColPlane {
                        material: 0,
                        margin: 0.04,
                        normal: Vector3::UNIT_Z,
                        distance: -3.5,
                    }),
                    TColShape::Sphere(TColSphere {
                        material: 1,
                        margin: 0.01,
                        centre: Vector3::ZERO,
                        radius: 1e-3,
                    }),
                ],
            }),
            trimesh: Some(TColTriMesh {
                margin: 0.02,
                vertexes: vec![Vector3::ZERO, Vector3::UNIT_X, Vector3::UNIT_Y],
                faces: vec![TColFace::new(0, 1, 2, 1), TColFace::new(2, 1, 0, 2)],
            }),
        }
    }

    #[test]
    fn test_print_then_parse_is_identity() {
        let db = db();
        let original = sample();
        let text = pretty_print(&original, &db);
        let reparsed = parse_tcol("printed.tcol", &text, &db).unwrap();
        assert_eq!(reparsed, original);
    }

    #[test]
    fn test_static_prints_static_and_no_inertia() {
        let db = db();
        let file = TColFile {
            compound: Some(TColCompound::default()),
            ..TColFile::default()
        };
        let text = pretty_print(&file, &db);
        assert!(text.starts_with("TCOL1.0\n"));
        assert!(text.contains("static;"));
        assert!(!text.contains("inertia"));
        assert!(!text.contains("mass"));
        assert_eq!(parse_tcol("s.tcol", &text, &db).unwrap(), file);
    }

    #[test]
    fn test_inferred_inertia_stays_inferred() {
        let db = db();
        let file = TColFile {
            mass: 3.0,
            inertia: None,
            trimesh: Some(TColTriMesh::default()),
            ..TColFile::default()
        };
        let text = pretty_print(&file, &db);
        assert!(!text.contains("inertia"));
        assert_eq!(parse_tcol("d.tcol", &text, &db).unwrap().inertia, None);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a\"b\\c"), "a\\\"b\\\\c");
    }
}
