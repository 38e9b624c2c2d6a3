use crate::raster::GeoTransform;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Bounds {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Result<Self, String> {
        if xmin > xmax || ymin > ymax {
            return Err("Min values must be <= max values".to_string());
        }

        Ok(Bounds {
            xmin,
            xmax,
            ymin,
            ymax,
        })
    }

    /// Georeferenced extent of a grid, from its affine transform and size.
    /// Rotation terms are honored by taking the envelope of the four corners.
    pub fn from_grid(geo_transform: &GeoTransform, cols: usize, rows: usize) -> Self {
        let corners = [
            geo_transform.corner(0, 0),
            geo_transform.corner(0, cols),
            geo_transform.corner(rows, 0),
            geo_transform.corner(rows, cols),
        ];

        let mut bounds = Bounds {
            xmin: f64::INFINITY,
            xmax: f64::NEG_INFINITY,
            ymin: f64::INFINITY,
            ymax: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            bounds.xmin = bounds.xmin.min(x);
            bounds.xmax = bounds.xmax.max(x);
            bounds.ymin = bounds.ymin.min(y);
            bounds.ymax = bounds.ymax.max(y);
        }

        bounds
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            xmin: self.xmin.min(other.xmin),
            xmax: self.xmax.max(other.xmax),
            ymin: self.ymin.min(other.ymin),
            ymax: self.ymax.max(other.ymax),
        }
    }
}
