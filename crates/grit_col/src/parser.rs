//! TCOL recursive-descent parser
//!
//! ```text
//! file       := "TCOL1.0" attributes (compound trimesh? | trimesh)
//! attributes := "attributes" "{" attribute* "}"
//! compound   := "compound" "{" (hull | box | cylinder | cone | plane | sphere)* "}"
//! trimesh    := "trimesh" "{" margin? "vertexes" "{" vertex* "}" "faces" "{" face* "}" "}"
//! ```
//!
//! Every list item is followed by `;` (more to come) or closed by `}`.
//! Nested blocks such as `vertexes { .. }` take no separator. Attributes
//! and shape fields may appear in any order but only once each.

use grit_math::{Quaternion, Vector3};

use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::material::{MaterialDb, MaterialId};
use crate::tcol::{
    TColBox, TColCompound, TColCone, TColCylinder, TColFace, TColFile, TColHull, TColPlane,
    TColShape, TColSphere, TColTriMesh, DEFAULT_MARGIN,
};

/// First token of every TCOL document
pub const TCOL_HEADER: &str = "TCOL1.0";

/// Parse a TCOL document, resolving materials against `db`
///
/// `name` is only used for error locations and log messages.
pub fn parse_tcol(name: &str, input: &str, db: &MaterialDb) -> Result<TColFile, ParseError> {
    let mut parser = Parser::new(name, input, db);
    parser.parse_file()
}

/// Parse a TCOL document from raw bytes
pub fn parse_tcol_bytes(name: &str, bytes: &[u8], db: &MaterialDb) -> Result<TColFile, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|e| {
        ParseError::new(
            format!("Not valid UTF-8 (at byte {})", e.valid_up_to()),
            "parse_tcol_bytes",
            name,
            1,
            1,
        )
    })?;
    parse_tcol(name, text, db)
}

struct Parser<'a> {
    name: &'a str,
    lexer: Lexer<'a>,
    peeked: Option<Token>,
    db: &'a MaterialDb,
}

/// Tracks which once-only fields have been seen in a block
#[derive(Default)]
struct Seen(Vec<&'static str>);

impl Seen {
    fn check(&mut self, field: &'static str, parser: &Parser<'_>, at: &Token, func: &'static str) -> Result<(), ParseError> {
        if self.0.contains(&field) {
            return Err(parser.error_at(at, func, format!("Already have {}", field)));
        }
        self.0.push(field);
        Ok(())
    }

    fn has(&self, field: &str) -> bool {
        self.0.contains(&field)
    }
}

impl<'a> Parser<'a> {
    fn new(name: &'a str, input: &'a str, db: &'a MaterialDb) -> Self {
        Self {
            name,
            lexer: Lexer::new(name, input),
            peeked: None,
            db,
        }
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        match self.peeked.take() {
            Some(t) => Ok(t),
            None => self.lexer.next_token(),
        }
    }

    fn peek(&mut self) -> Result<&Token, ParseError> {
        let t = match self.peeked.take() {
            Some(t) => t,
            None => self.lexer.next_token()?,
        };
        Ok(self.peeked.insert(t))
    }

    fn error_at(&self, at: &Token, func: &'static str, message: impl Into<String>) -> ParseError {
        ParseError::new(message, func, self.name, at.line, at.column)
    }

    fn unexpected(&self, at: &Token, func: &'static str, wanted: &str) -> ParseError {
        self.error_at(at, func, format!("Expected {}, got {}", wanted, at.kind.describe()))
    }

    fn expect(&mut self, kind: TokenKind, func: &'static str) -> Result<Token, ParseError> {
        let t = self.next()?;
        if t.kind != kind {
            return Err(self.unexpected(&t, func, &kind.describe()));
        }
        Ok(t)
    }

    fn expect_keyword(&mut self, keyword: &str, func: &'static str) -> Result<Token, ParseError> {
        let t = self.next()?;
        match &t.kind {
            TokenKind::Ident(s) if s == keyword => Ok(t),
            _ => Err(self.unexpected(&t, func, &format!("'{}'", keyword))),
        }
    }

    /// Integer or float, read as f32
    fn real(&mut self, func: &'static str) -> Result<f32, ParseError> {
        let t = self.next()?;
        match t.kind {
            TokenKind::Integer(i) => Ok(i as f32),
            TokenKind::Float(f) => Ok(f),
            _ => Err(self.unexpected(&t, func, "a number")),
        }
    }

    fn positive_real(&mut self, what: &str, func: &'static str) -> Result<f32, ParseError> {
        let at = self.peek()?.clone();
        let v = self.real(func)?;
        if v < 0.0 {
            return Err(self.error_at(&at, func, format!("{} must not be negative", what)));
        }
        Ok(v)
    }

    fn vector3(&mut self, func: &'static str) -> Result<Vector3, ParseError> {
        let x = self.real(func)?;
        let y = self.real(func)?;
        let z = self.real(func)?;
        Ok(Vector3::new(x, y, z))
    }

    /// `w x y z`
    fn quaternion(&mut self, func: &'static str) -> Result<Quaternion, ParseError> {
        let w = self.real(func)?;
        let x = self.real(func)?;
        let y = self.real(func)?;
        let z = self.real(func)?;
        Ok(Quaternion::new(w, x, y, z))
    }

    fn index(&mut self, func: &'static str) -> Result<(u32, Token), ParseError> {
        let t = self.next()?;
        match t.kind {
            TokenKind::Integer(i) if (0..=u32::MAX as i64).contains(&i) => Ok((i as u32, t)),
            _ => Err(self.unexpected(&t, func, "a vertex index")),
        }
    }

    fn material(&mut self, func: &'static str) -> Result<MaterialId, ParseError> {
        let t = self.next()?;
        match &t.kind {
            TokenKind::Str(name) => {
                let context = format!("{}:{}:{}", self.name, t.line, t.column);
                Ok(self.db.resolve(name, &context))
            }
            _ => Err(self.unexpected(&t, func, "a material string")),
        }
    }

    /// After a list item: `;` means continue, `}` closes the list
    ///
    /// A `;` directly followed by `}` also closes the list, so both
    /// `a; b; }` and `a; b }` are accepted.
    fn more_to_come(&mut self, func: &'static str) -> Result<bool, ParseError> {
        let t = self.next()?;
        match t.kind {
            TokenKind::Semicolon => {
                if self.peek()?.kind == TokenKind::RBrace {
                    self.next()?;
                    Ok(false)
                } else {
                    Ok(true)
                }
            }
            TokenKind::RBrace => Ok(false),
            _ => Err(self.unexpected(&t, func, "; or }")),
        }
    }

    /// Consume a `}` if it is next (empty block or trailing close)
    fn close_if_next(&mut self) -> Result<bool, ParseError> {
        if self.peek()?.kind == TokenKind::RBrace {
            self.next()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn field_name(&mut self, func: &'static str) -> Result<(String, Token), ParseError> {
        let t = self.next()?;
        match &t.kind {
            TokenKind::Ident(s) => Ok((s.clone(), t)),
            _ => Err(self.unexpected(&t, func, "a field name")),
        }
    }

    fn parse_file(&mut self) -> Result<TColFile, ParseError> {
        const FUNC: &str = "parse_file";
        let header = self.next()?;
        match &header.kind {
            TokenKind::Ident(s) if s == TCOL_HEADER => {}
            _ => return Err(self.error_at(&header, FUNC, format!("File must start with {}", TCOL_HEADER))),
        }

        let mut file = self.parse_attributes()?;

        let t = self.next()?;
        match &t.kind {
            TokenKind::Ident(s) if s == "compound" => {
                file.compound = Some(self.parse_compound()?);
                let after = self.next()?;
                match &after.kind {
                    TokenKind::Ident(s) if s == "trimesh" => {
                        file.trimesh = Some(self.parse_trimesh()?);
                        let end = self.next()?;
                        if end.kind != TokenKind::Eof {
                            return Err(self.unexpected(&end, FUNC, "end of file"));
                        }
                    }
                    TokenKind::Eof => {}
                    _ => return Err(self.unexpected(&after, FUNC, "'trimesh' or end of file")),
                }
            }
            TokenKind::Ident(s) if s == "trimesh" => {
                file.trimesh = Some(self.parse_trimesh()?);
                let end = self.next()?;
                if end.kind != TokenKind::Eof {
                    return Err(self.unexpected(&end, FUNC, "end of file"));
                }
            }
            _ => return Err(self.unexpected(&t, FUNC, "'compound' or 'trimesh'")),
        }

        Ok(file)
    }

    fn parse_attributes(&mut self) -> Result<TColFile, ParseError> {
        const FUNC: &str = "parse_attributes";
        self.expect_keyword("attributes", FUNC)?;
        let open = self.expect(TokenKind::LBrace, FUNC)?;

        let mut file = TColFile::default();
        let mut seen = Seen::default();
        let mut is_static = false;

        if !self.close_if_next()? {
            loop {
                let (field, at) = self.field_name(FUNC)?;
                match field.as_str() {
                    "static" => {
                        seen.check("mass", self, &at, FUNC)?;
                        is_static = true;
                        file.mass = 0.0;
                    }
                    "mass" => {
                        seen.check("mass", self, &at, FUNC)?;
                        file.mass = self.positive_real("mass", FUNC)?;
                        is_static = file.mass == 0.0;
                    }
                    "inertia" => {
                        seen.check("inertia", self, &at, FUNC)?;
                        file.inertia = Some(self.vector3(FUNC)?);
                    }
                    "linear_damping" => {
                        seen.check("linear_damping", self, &at, FUNC)?;
                        file.linear_damping = self.real(FUNC)?;
                    }
                    "angular_damping" => {
                        seen.check("angular_damping", self, &at, FUNC)?;
                        file.angular_damping = self.real(FUNC)?;
                    }
                    "linear_sleep_threshold" => {
                        seen.check("linear_sleep_threshold", self, &at, FUNC)?;
                        file.linear_sleep_threshold = self.real(FUNC)?;
                    }
                    "angular_sleep_threshold" => {
                        seen.check("angular_sleep_threshold", self, &at, FUNC)?;
                        file.angular_sleep_threshold = self.real(FUNC)?;
                    }
                    "ccd_motion_threshold" => {
                        seen.check("ccd_motion_threshold", self, &at, FUNC)?;
                        file.ccd_motion_threshold = self.real(FUNC)?;
                    }
                    "ccd_swept_sphere_radius" => {
                        seen.check("ccd_swept_sphere_radius", self, &at, FUNC)?;
                        file.ccd_swept_sphere_radius = self.real(FUNC)?;
                    }
                    other => {
                        return Err(self.error_at(&at, FUNC, format!("Unknown attribute \"{}\"", other)))
                    }
                }
                if !self.more_to_come(FUNC)? {
                    break;
                }
            }
        }

        if !seen.has("mass") {
            return Err(self.error_at(&open, FUNC, "Need either static or mass"));
        }
        if is_static {
            file.inertia = Some(Vector3::ZERO);
        } else if !seen.has("inertia") {
            file.inertia = None;
        }
        Ok(file)
    }

    fn parse_compound(&mut self) -> Result<TColCompound, ParseError> {
        const FUNC: &str = "parse_compound";
        self.expect(TokenKind::LBrace, FUNC)?;
        let mut compound = TColCompound::default();
        loop {
            let t = self.next()?;
            let shape = match &t.kind {
                TokenKind::RBrace => break,
                TokenKind::Ident(s) => match s.as_str() {
                    "hull" => TColShape::Hull(self.parse_hull()?),
                    "box" => TColShape::Box(self.parse_box()?),
                    "cylinder" => TColShape::Cylinder(self.parse_cylinder()?),
                    "cone" => TColShape::Cone(self.parse_cone()?),
                    "plane" => TColShape::Plane(self.parse_plane()?),
                    "sphere" => TColShape::Sphere(self.parse_sphere()?),
                    _ => return Err(self.unexpected(&t, FUNC, "a shape")),
                },
                _ => return Err(self.unexpected(&t, FUNC, "a shape or }")),
            };
            compound.shapes.push(shape);
        }
        Ok(compound)
    }

    /// Shared field loop for the primitive shapes
    ///
    /// `field` handles one named field and returns whether it was a nested
    /// block (which takes no trailing separator).
    fn parse_fields<F>(&mut self, func: &'static str, mut field: F) -> Result<Token, ParseError>
    where
        F: FnMut(&mut Self, &str, &Token, &mut Seen) -> Result<bool, ParseError>,
    {
        let open = self.expect(TokenKind::LBrace, func)?;
        let mut seen = Seen::default();
        loop {
            if self.close_if_next()? {
                break;
            }
            let (name, at) = self.field_name(func)?;
            let was_block = field(self, &name, &at, &mut seen)?;
            if !was_block && !self.more_to_come(func)? {
                break;
            }
        }
        Ok(open)
    }

    fn missing(&self, at: &Token, func: &'static str, shape: &str, field: &str) -> ParseError {
        self.error_at(at, func, format!("{} needs {}", shape, field))
    }

    fn parse_margin(&mut self, func: &'static str) -> Result<f32, ParseError> {
        self.positive_real("margin", func)
    }

    fn parse_hull(&mut self) -> Result<TColHull, ParseError> {
        const FUNC: &str = "parse_hull";
        let mut margin = DEFAULT_MARGIN;
        let mut material = None;
        let mut vertexes = None;
        let open = self.parse_fields(FUNC, |p, name, at, seen| {
            match name {
                "margin" => {
                    seen.check("margin", p, at, FUNC)?;
                    margin = p.parse_margin(FUNC)?;
                }
                "material" => {
                    seen.check("material", p, at, FUNC)?;
                    material = Some(p.material(FUNC)?);
                }
                "vertexes" => {
                    seen.check("vertexes", p, at, FUNC)?;
                    vertexes = Some(p.parse_vertexes()?);
                    return Ok(true);
                }
                other => return Err(p.error_at(at, FUNC, format!("Unknown hull field \"{}\"", other))),
            }
            Ok(false)
        })?;
        Ok(TColHull {
            material: material.ok_or_else(|| self.missing(&open, FUNC, "hull", "material"))?,
            margin,
            vertexes: vertexes.ok_or_else(|| self.missing(&open, FUNC, "hull", "vertexes"))?,
        })
    }

    /// Fields shared by box and cylinder
    fn parse_oriented(&mut self, func: &'static str, shape: &'static str) -> Result<TColBox, ParseError> {
        let mut margin = DEFAULT_MARGIN;
        let mut material = None;
        let mut centre = Vector3::ZERO;
        let mut orientation = Quaternion::IDENTITY;
        let mut dimensions = None;
        let open = self.parse_fields(func, |p, name, at, seen| {
            match name {
                "margin" => {
                    seen.check("margin", p, at, func)?;
                    margin = p.parse_margin(func)?;
                }
                "material" => {
                    seen.check("material", p, at, func)?;
                    material = Some(p.material(func)?);
                }
                "centre" => {
                    seen.check("centre", p, at, func)?;
                    centre = p.vector3(func)?;
                }
                "orientation" => {
                    seen.check("orientation", p, at, func)?;
                    orientation = p.quaternion(func)?;
                }
                "dimensions" => {
                    seen.check("dimensions", p, at, func)?;
                    dimensions = Some(p.vector3(func)?);
                }
                other => {
                    return Err(p.error_at(at, func, format!("Unknown {} field \"{}\"", shape, other)))
                }
            }
            Ok(false)
        })?;
        Ok(TColBox {
            material: material.ok_or_else(|| self.missing(&open, func, shape, "material"))?,
            margin,
            centre,
            orientation,
            dimensions: dimensions.ok_or_else(|| self.missing(&open, func, shape, "dimensions"))?,
        })
    }

    fn parse_box(&mut self) -> Result<TColBox, ParseError> {
        self.parse_oriented("parse_box", "box")
    }

    fn parse_cylinder(&mut self) -> Result<TColCylinder, ParseError> {
        let b = self.parse_oriented("parse_cylinder", "cylinder")?;
        Ok(TColCylinder {
            material: b.material,
            margin: b.margin,
            centre: b.centre,
            orientation: b.orientation,
            dimensions: b.dimensions,
        })
    }

    fn parse_cone(&mut self) -> Result<TColCone, ParseError> {
        const FUNC: &str = "parse_cone";
        let mut margin = DEFAULT_MARGIN;
        let mut material = None;
        let mut centre = Vector3::ZERO;
        let mut orientation = Quaternion::IDENTITY;
        let mut radius = None;
        let mut height = None;
        let open = self.parse_fields(FUNC, |p, name, at, seen| {
            match name {
                "margin" => {
                    seen.check("margin", p, at, FUNC)?;
                    margin = p.parse_margin(FUNC)?;
                }
                "material" => {
                    seen.check("material", p, at, FUNC)?;
                    material = Some(p.material(FUNC)?);
                }
                "centre" => {
                    seen.check("centre", p, at, FUNC)?;
                    centre = p.vector3(FUNC)?;
                }
                "orientation" => {
                    seen.check("orientation", p, at, FUNC)?;
                    orientation = p.quaternion(FUNC)?;
                }
                "radius" => {
                    seen.check("radius", p, at, FUNC)?;
                    radius = Some(p.positive_real("radius", FUNC)?);
                }
                "height" => {
                    seen.check("height", p, at, FUNC)?;
                    height = Some(p.positive_real("height", FUNC)?);
                }
                other => return Err(p.error_at(at, FUNC, format!("Unknown cone field \"{}\"", other))),
            }
            Ok(false)
        })?;
        Ok(TColCone {
            material: material.ok_or_else(|| self.missing(&open, FUNC, "cone", "material"))?,
            margin,
            centre,
            orientation,
            radius: radius.ok_or_else(|| self.missing(&open, FUNC, "cone", "radius"))?,
            height: height.ok_or_else(|| self.missing(&open, FUNC, "cone", "height"))?,
        })
    }

    fn parse_plane(&mut self) -> Result<TColPlane, ParseError> {
        const FUNC: &str = "parse_plane";
        let mut margin = DEFAULT_MARGIN;
        let mut material = None;
        let mut normal = None;
        let mut distance = None;
        let open = self.parse_fields(FUNC, |p, name, at, seen| {
            match name {
                "margin" => {
                    seen.check("margin", p, at, FUNC)?;
                    margin = p.parse_margin(FUNC)?;
                }
                "material" => {
                    seen.check("material", p, at, FUNC)?;
                    material = Some(p.material(FUNC)?);
                }
                "normal" => {
                    seen.check("normal", p, at, FUNC)?;
                    normal = Some(p.vector3(FUNC)?);
                }
                "distance" => {
                    seen.check("distance", p, at, FUNC)?;
                    distance = Some(p.real(FUNC)?);
                }
                other => return Err(p.error_at(at, FUNC, format!("Unknown plane field \"{}\"", other))),
            }
            Ok(false)
        })?;
        Ok(TColPlane {
            material: material.ok_or_else(|| self.missing(&open, FUNC, "plane", "material"))?,
            margin,
            normal: normal.ok_or_else(|| self.missing(&open, FUNC, "plane", "normal"))?,
            distance: distance.ok_or_else(|| self.missing(&open, FUNC, "plane", "distance"))?,
        })
    }

    fn parse_sphere(&mut self) -> Result<TColSphere, ParseError> {
        const FUNC: &str = "parse_sphere";
        let mut margin = DEFAULT_MARGIN;
        let mut material = None;
        let mut centre = Vector3::ZERO;
        let mut radius = None;
        let open = self.parse_fields(FUNC, |p, name, at, seen| {
            match name {
                "margin" => {
                    seen.check("margin", p, at, FUNC)?;
                    margin = p.parse_margin(FUNC)?;
                }
                "material" => {
                    seen.check("material", p, at, FUNC)?;
                    material = Some(p.material(FUNC)?);
                }
                "centre" => {
                    seen.check("centre", p, at, FUNC)?;
                    centre = p.vector3(FUNC)?;
                }
                "radius" => {
                    seen.check("radius", p, at, FUNC)?;
                    radius = Some(p.positive_real("radius", FUNC)?);
                }
                other => return Err(p.error_at(at, FUNC, format!("Unknown sphere field \"{}\"", other))),
            }
            Ok(false)
        })?;
        Ok(TColSphere {
            material: material.ok_or_else(|| self.missing(&open, FUNC, "sphere", "material"))?,
            margin,
            centre,
            radius: radius.ok_or_else(|| self.missing(&open, FUNC, "sphere", "radius"))?,
        })
    }

    fn parse_vertexes(&mut self) -> Result<Vec<Vector3>, ParseError> {
        const FUNC: &str = "parse_vertexes";
        self.expect(TokenKind::LBrace, FUNC)?;
        let mut vertexes = Vec::new();
        if self.close_if_next()? {
            return Ok(vertexes);
        }
        loop {
            vertexes.push(self.vector3(FUNC)?);
            if !self.more_to_come(FUNC)? {
                break;
            }
        }
        Ok(vertexes)
    }

    fn parse_faces(&mut self, vertex_count: usize) -> Result<Vec<TColFace>, ParseError> {
        const FUNC: &str = "parse_faces";
        self.expect(TokenKind::LBrace, FUNC)?;
        let mut faces = Vec::new();
        if self.close_if_next()? {
            return Ok(faces);
        }
        loop {
            let mut idx = [0u32; 3];
            for slot in idx.iter_mut() {
                let (i, at) = self.index(FUNC)?;
                if i as usize >= vertex_count {
                    return Err(self.error_at(
                        &at,
                        FUNC,
                        format!("Vertex index {} out of range ({} vertexes)", i, vertex_count),
                    ));
                }
                *slot = i;
            }
            let material = self.material(FUNC)?;
            faces.push(TColFace::new(idx[0], idx[1], idx[2], material));
            if !self.more_to_come(FUNC)? {
                break;
            }
        }
        Ok(faces)
    }

    fn parse_trimesh(&mut self) -> Result<TColTriMesh, ParseError> {
        const FUNC: &str = "parse_trimesh";
        let mut margin = DEFAULT_MARGIN;
        let mut vertexes: Option<Vec<Vector3>> = None;
        let mut faces = None;
        let open = self.parse_fields(FUNC, |p, name, at, seen| {
            match name {
                "margin" => {
                    seen.check("margin", p, at, FUNC)?;
                    margin = p.parse_margin(FUNC)?;
                }
                "vertexes" => {
                    seen.check("vertexes", p, at, FUNC)?;
                    vertexes = Some(p.parse_vertexes()?);
                    return Ok(true);
                }
                "faces" => {
                    seen.check("faces", p, at, FUNC)?;
                    let count = match &vertexes {
                        Some(v) => v.len(),
                        None => return Err(p.error_at(at, FUNC, "faces must come after vertexes")),
                    };
                    faces = Some(p.parse_faces(count)?);
                    return Ok(true);
                }
                other => {
                    return Err(p.error_at(at, FUNC, format!("Unknown trimesh field \"{}\"", other)))
                }
            }
            Ok(false)
        })?;
        Ok(TColTriMesh {
            margin,
            vertexes: vertexes.ok_or_else(|| self.missing(&open, FUNC, "trimesh", "vertexes"))?,
            faces: faces.ok_or_else(|| self.missing(&open, FUNC, "trimesh", "faces"))?,
        })
    }
}
