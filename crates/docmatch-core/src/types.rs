use serde::{Deserialize, Serialize};

/// Raw detector output for one face, in the coordinate space of the image
/// version it was detected on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Integer pixel box, truncated the same way the detector rows are read.
    pub fn face_box(&self) -> FaceBox {
        FaceBox::new(
            self.x as i32,
            self.y as i32,
            self.width as i32,
            self.height as i32,
        )
    }

    /// Ranking metric used by every sweep: bigger and more confident wins.
    pub fn area_score(&self) -> f32 {
        self.face_box().area() as f32 * self.confidence
    }
}

/// Integer pixel rectangle `{x, y, w, h}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl FaceBox {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// `w * h`, with malformed (negative) sides counted as zero.
    pub fn area(&self) -> i64 {
        i64::from(self.w.max(0)) * i64::from(self.h.max(0))
    }

    pub fn min_side(&self) -> i32 {
        self.w.min(self.h)
    }

    /// Saturates at `i32::MAX` for caller-supplied boxes far outside any image.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.w)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.h)
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.w as f32 * 0.5,
            self.y as f32 + self.h as f32 * 0.5,
        )
    }
}

impl std::fmt::Display for FaceBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.w, self.h)
    }
}

impl std::str::FromStr for FaceBox {
    type Err = String;

    /// Parses `x,y,w,h`. Non-positive width or height is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<i32> = s
            .split(',')
            .map(|p| p.trim().parse::<i32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid box {s:?}: {e}"))?;

        let [x, y, w, h] = parts[..] else {
            return Err(format!("invalid box {s:?}: expected x,y,w,h"));
        };
        if w <= 0 || h <= 0 {
            return Err(format!("invalid box {s:?}: width and height must be positive"));
        }
        Ok(FaceBox::new(x, y, w, h))
    }
}

/// Face embedding vector produced by the recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            (dot / denom).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: Vec<f32>) -> Embedding {
        Embedding { values, model_version: None }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = emb(vec![1.0, 0.0, 0.0]);
        let b = emb(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = emb(vec![1.0, 0.0]);
        let b = emb(vec![0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = emb(vec![1.0, 0.0]);
        let b = emb(vec![-1.0, 0.0]);
        assert!((a.similarity(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = emb(vec![0.0, 0.0]);
        let b = emb(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_face_box_area_clamps_negative_sides() {
        assert_eq!(FaceBox::new(0, 0, 10, 20).area(), 200);
        assert_eq!(FaceBox::new(0, 0, -10, 20).area(), 0);
        assert_eq!(FaceBox::new(0, 0, 10, -1).area(), 0);
    }

    #[test]
    fn test_face_box_edges_saturate_near_i32_max() {
        let far = FaceBox::new(i32::MAX - 47, i32::MAX - 10, 100, 100);
        assert_eq!(far.right(), i32::MAX);
        assert_eq!(far.bottom(), i32::MAX);
        assert_eq!(crate::geometry::iou(&far, &FaceBox::new(0, 0, 640, 480)), 0.0);
    }

    #[test]
    fn test_face_box_from_detection_truncates() {
        let det = BoundingBox {
            x: 10.9, y: 20.2, width: 50.7, height: 60.1,
            confidence: 0.9, landmarks: None,
        };
        assert_eq!(det.face_box(), FaceBox::new(10, 20, 50, 60));
        assert!((det.area_score() - 3000.0 * 0.9).abs() < 1e-3);
    }

    #[test]
    fn test_face_box_parse() {
        let b: FaceBox = "12, 34,56,78".parse().unwrap();
        assert_eq!(b, FaceBox::new(12, 34, 56, 78));
        assert_eq!(b.to_string(), "12,34,56,78");
    }

    #[test]
    fn test_face_box_parse_rejects_bad_input() {
        assert!("1,2,3".parse::<FaceBox>().is_err());
        assert!("1,2,0,4".parse::<FaceBox>().is_err());
        assert!("a,b,c,d".parse::<FaceBox>().is_err());
    }
}
