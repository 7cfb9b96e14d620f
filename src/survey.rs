//! HiPS survey configuration and tile URL construction.

/// A HiPS image survey served under the standard
/// `Norder{order}/Dir{dir}/Npix{pixel}` layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HipsSurvey {
    pub name: String,
    pub base_url: String,
    /// Tile file extension, e.g. `jpg` or `png`.
    pub format: String,
    /// Deepest order the survey publishes.
    pub max_order: u8,
}

impl HipsSurvey {
    /// DSS2 color: full-sky coverage, the proven default.
    pub fn dss2_color() -> Self {
        HipsSurvey {
            name: "DSS2 Color".to_string(),
            base_url: "http://alasky.u-strasbg.fr/DSS/DSSColor".to_string(),
            format: "jpg".to_string(),
            max_order: 11,
        }
    }

    /// Directory bucket for a pixel: servers shard tiles into
    /// directories of 10000.
    pub fn tile_dir(pixel: u64) -> u64 {
        (pixel / 10000) * 10000
    }

    /// Tile URL for `pixel` at `order`:
    /// `{base}/Norder{order}/Dir{dir}/Npix{pixel}.{format}`.
    pub fn tile_url(&self, pixel: u64, order: u8) -> String {
        format!(
            "{}/Norder{}/Dir{}/Npix{}.{}",
            self.base_url,
            order,
            Self::tile_dir(pixel),
            pixel,
            self.format
        )
    }
}

impl Default for HipsSurvey {
    fn default() -> Self {
        HipsSurvey::dss2_color()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_buckets() {
        assert_eq!(HipsSurvey::tile_dir(0), 0);
        assert_eq!(HipsSurvey::tile_dir(9999), 0);
        assert_eq!(HipsSurvey::tile_dir(10000), 10000);
        assert_eq!(HipsSurvey::tile_dir(123456), 120000);
    }

    #[test]
    fn url_format() {
        let survey = HipsSurvey::dss2_color();
        assert_eq!(
            survey.tile_url(123456, 8),
            "http://alasky.u-strasbg.fr/DSS/DSSColor/Norder8/Dir120000/Npix123456.jpg"
        );
        assert_eq!(
            survey.tile_url(42, 6),
            "http://alasky.u-strasbg.fr/DSS/DSSColor/Norder6/Dir0/Npix42.jpg"
        );
    }

    #[test]
    fn custom_survey_url() {
        let survey = HipsSurvey {
            name: "test".to_string(),
            base_url: "https://example.org/hips".to_string(),
            format: "png".to_string(),
            max_order: 9,
        };
        assert_eq!(
            survey.tile_url(20000, 3),
            "https://example.org/hips/Norder3/Dir20000/Npix20000.png"
        );
    }
}
