//! Attribute animations
//!
//! Material colours and texture scrolling are driven by small XML files:
//!
//! ```xml
//! <AttributeAnimation>
//!     <Animation type="Color">
//!         <KeyFrame time="0" value="1 1 1 1" easing="Linear"/>
//!         <KeyFrame time="500" value="1 0 0 1" easing="SineInOut"/>
//!     </Animation>
//! </AttributeAnimation>
//! ```
//!
//! A file can hold several `Animation` nodes; each is addressed by its
//! position. [`AttributeAnimationFactory`] caches one shared instance per
//! file and index and advances all of them together.

mod easing;
mod value_animation;

pub use easing::Easing;
pub use value_animation::{Animatable, KeyFrame, ValueAnimation};

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{AssetError, AssetResult};
use crate::foundation::math::{Color, Vec2};

/// What an animation drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttributeAnimationType {
    /// Unknown `type` attribute; never produces a value
    #[default]
    Undefined,
    /// Diffuse colour
    Color,
    /// Grey level expanded to an opaque colour
    BlinkingColor,
    /// Texture coordinate offset
    ScrollUV,
}

impl AttributeAnimationType {
    fn from_name(name: &str) -> Self {
        match name {
            "Color" => Self::Color,
            "BlinkingColor" => Self::BlinkingColor,
            "Scrolling" => Self::ScrollUV,
            _ => Self::Undefined,
        }
    }
}

/// Current value of an attribute animation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeValue {
    /// Colour value
    Color(Color),
    /// Two-component value
    Vector2(Vec2),
    /// Scalar value
    Float(f32),
    /// Integer value
    Int(i32),
}

impl AttributeValue {
    /// The colour, if this is one
    pub fn as_color(&self) -> Option<Color> {
        match *self {
            Self::Color(color) => Some(color),
            _ => None,
        }
    }

    /// The vector, if this is one
    pub fn as_vector2(&self) -> Option<Vec2> {
        match *self {
            Self::Vector2(vector) => Some(vector),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Track {
    None,
    Color(ValueAnimation<Color>),
    Vector2(ValueAnimation<Vec2>),
}

/// One `Animation` node of an attribute animation file
#[derive(Debug, Clone)]
pub struct AttributeAnimation {
    path: PathBuf,
    index: usize,
    kind: AttributeAnimationType,
    track: Track,
    value: Option<AttributeValue>,
}

impl AttributeAnimation {
    /// Parse node `index` of the file at `path`.
    ///
    /// Returns `Ok(None)` when the file has fewer nodes than `index + 1`.
    pub fn load(path: impl AsRef<Path>, index: usize) -> AssetResult<Option<Self>> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|error| AssetError::from_io(path, error))?;
        Self::parse(path, &source, index)
    }

    fn parse(path: &Path, source: &str, index: usize) -> AssetResult<Option<Self>> {
        let document = roxmltree::Document::parse(source).map_err(|error| AssetError::Xml {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;

        let root = document.root_element();
        if !root.has_tag_name("AttributeAnimation") {
            return Ok(None);
        }

        let Some(node) = root
            .children()
            .filter(|child| child.has_tag_name("Animation"))
            .nth(index)
        else {
            return Ok(None);
        };

        let kind = AttributeAnimationType::from_name(node.attribute("type").unwrap_or_default());
        let mut track = match kind {
            AttributeAnimationType::Color | AttributeAnimationType::BlinkingColor => {
                Track::Color(ValueAnimation::new())
            }
            AttributeAnimationType::ScrollUV => Track::Vector2(ValueAnimation::new()),
            AttributeAnimationType::Undefined => Track::None,
        };

        for key in node.children().filter(|child| child.has_tag_name("KeyFrame")) {
            let time = key.attribute("time").and_then(|t| t.trim().parse().ok()).unwrap_or(0.0);
            let easing = Easing::from_name(key.attribute("easing").unwrap_or_default());
            let value = key.attribute("value").unwrap_or_default();

            match &mut track {
                Track::Color(animation) if kind == AttributeAnimationType::BlinkingColor => {
                    let [level] = parse_floats(value);
                    animation.set_key_frame(time, Color::new(level, level, level, 1.0), easing);
                }
                Track::Color(animation) => {
                    let [r, g, b, a] = parse_floats(value);
                    animation.set_key_frame(time, Color::new(r, g, b, a), easing);
                }
                Track::Vector2(animation) => {
                    let [x, y] = parse_floats(value);
                    animation.set_key_frame(time, Vec2::new(x, y), easing);
                }
                Track::None => {}
            }
        }

        let value = match &track {
            Track::Color(animation) => animation.initial_value().map(AttributeValue::Color),
            Track::Vector2(animation) => animation.initial_value().map(AttributeValue::Vector2),
            Track::None => None,
        };

        Ok(Some(Self {
            path: path.to_path_buf(),
            index,
            kind,
            track,
            value,
        }))
    }

    /// Advance the animation.
    ///
    /// Scrolling holds its first key; the shader integrates it over time.
    pub fn update(&mut self, elapsed: f32) {
        match &mut self.track {
            Track::Vector2(animation) => {
                if let Some(initial) = animation.initial_value() {
                    self.value = Some(AttributeValue::Vector2(initial));
                }
            }
            Track::Color(animation) => {
                if let Some(color) = animation.update(elapsed) {
                    self.value = Some(AttributeValue::Color(color));
                }
            }
            Track::None => {}
        }
    }

    /// What the animation drives
    pub fn kind(&self) -> AttributeAnimationType {
        self.kind
    }

    /// Current value; `None` for undefined or keyless animations
    pub fn value(&self) -> Option<AttributeValue> {
        self.value
    }

    /// Source file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Position of the node within its file
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Parse up to `N` whitespace-separated floats; missing values are zero
fn parse_floats<const N: usize>(text: &str) -> [f32; N] {
    let mut values = [0.0; N];
    for (slot, token) in values.iter_mut().zip(text.split_whitespace()) {
        *slot = token.parse().unwrap_or(0.0);
    }
    values
}

/// Shared, cached attribute animations
#[derive(Debug, Default)]
pub struct AttributeAnimationFactory {
    cache: HashMap<String, Rc<RefCell<AttributeAnimation>>>,
}

impl AttributeAnimationFactory {
    /// Empty factory
    pub fn new() -> Self {
        Self::default()
    }

    fn cache_key(path: &Path, index: usize) -> String {
        format!("{}{index}", path.display())
    }

    /// Get or load node `index` of `path`.
    ///
    /// Returns `None` when the file cannot be read or has no such node, which
    /// callers use to stop enumerating a file.
    pub fn create(&mut self, path: impl AsRef<Path>, index: usize) -> Option<Rc<RefCell<AttributeAnimation>>> {
        let path = path.as_ref();
        let key = Self::cache_key(path, index);

        if let Some(animation) = self.cache.get(&key) {
            return Some(Rc::clone(animation));
        }

        match AttributeAnimation::load(path, index) {
            Ok(Some(animation)) => {
                log::debug!("Loaded attribute animation {} #{index} ({:?})", path.display(), animation.kind());
                let animation = Rc::new(RefCell::new(animation));
                self.cache.insert(key, Rc::clone(&animation));
                Some(animation)
            }
            Ok(None) => None,
            Err(error) => {
                log::debug!("Attribute animation unavailable: {error}");
                None
            }
        }
    }

    /// Load every node of `path`, in order
    pub fn create_all(&mut self, path: impl AsRef<Path>) -> Vec<Rc<RefCell<AttributeAnimation>>> {
        let path = path.as_ref();
        (0..).map_while(|index| self.create(path, index)).collect()
    }

    /// Advance every cached animation
    pub fn update(&self, elapsed: f32) {
        for animation in self.cache.values() {
            animation.borrow_mut().update(elapsed);
        }
    }

    /// Re-read every cached animation from disk.
    ///
    /// Shared handles see the new keys; entries whose file no longer parses
    /// keep their previous state.
    pub fn reload(&self) {
        for animation in self.cache.values() {
            let (path, index) = {
                let current = animation.borrow();
                (current.path.clone(), current.index)
            };

            match AttributeAnimation::load(&path, index) {
                Ok(Some(fresh)) => *animation.borrow_mut() = fresh,
                Ok(None) => log::warn!("Attribute animation {} #{index} disappeared on reload", path.display()),
                Err(error) => log::warn!("Failed to reload attribute animation: {error}"),
            }
        }
    }

    /// Number of cached animations
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
