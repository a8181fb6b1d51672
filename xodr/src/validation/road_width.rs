use crate::road::Road;

/// The side of the road a [`RoadTooWideViolation`] occurred on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryDirection {
    Left,
    Right,
}

impl BoundaryDirection {
    pub fn name(self) -> &'static str {
        match self {
            BoundaryDirection::Left => "left",
            BoundaryDirection::Right => "right",
        }
    }
}

/// An s-interval of a road where the lanes on one side are wider than the
/// reference line's radius of curvature.
///
/// Where that happens, the outer lane boundary sweeps past the center of
/// curvature and the lane graph folds over itself: the boundary polylines of
/// a tessellation self-intersect, and s/t coordinates in the interval stop
/// being unique.
#[derive(Clone, Debug, PartialEq)]
pub struct RoadTooWideViolation {
    pub start_s: f64,
    pub end_s: f64,
    pub direction: BoundaryDirection,
}

impl RoadTooWideViolation {
    pub fn new(start_s: f64, end_s: f64, direction: BoundaryDirection) -> Self {
        RoadTooWideViolation {
            start_s,
            end_s,
            direction,
        }
    }

    /// A human readable description of this violation.
    pub fn description(&self) -> String {
        format!(
            "The {} lanes are wider than the reference line's radius of curvature between s={} and s={}, \
             so the lane boundaries self-intersect there.",
            self.direction.name(),
            self.start_s,
            self.end_s
        )
    }
}

/// Checks that a road's lanes stay within the reference line's radius of
/// curvature.
///
/// The road is sampled along its s-range at the given resolution. At each
/// sample the total lane width on the inner side of the curve is compared
/// against the radius of curvature; consecutive offending samples are merged
/// into one [`RoadTooWideViolation`] per side.
pub struct RoadWidthValidator<'a> {
    road: &'a Road,
    resolution: f64,
}

impl<'a> RoadWidthValidator<'a> {
    pub fn new(road: &'a Road, resolution: f64) -> Self {
        debug_assert!(resolution > 0.0);
        RoadWidthValidator { road, resolution }
    }

    /// Runs the check. Returns true if the road is nowhere too wide; any
    /// violations are appended to `errors`.
    pub fn validate_road_width(&self, errors: &mut Vec<RoadTooWideViolation>) -> bool {
        let end_s = self.road.reference_line().end_s();

        let mut left_run: Option<f64> = None;
        let mut right_run: Option<f64> = None;
        let mut success = true;

        let mut i = 0;
        loop {
            let s = i as f64 * self.resolution;
            if s > end_s + 1e-9 {
                break;
            }
            let s = s.min(end_s);

            let curvature = self.road.reference_line().eval_curvature(s);
            let section = self.road.lane_section_containing(s);
            let s_offset = s - section.start_s();

            let left_violated = curvature > 0.0 && section.left_width_at_s_offset(s_offset) >= 1.0 / curvature;
            let right_violated = curvature < 0.0 && section.right_width_at_s_offset(s_offset) >= -1.0 / curvature;

            Self::advance_run(&mut left_run, left_violated, s, BoundaryDirection::Left, errors, &mut success);
            Self::advance_run(&mut right_run, right_violated, s, BoundaryDirection::Right, errors, &mut success);

            i += 1;
        }

        if let Some(start_s) = left_run {
            errors.push(RoadTooWideViolation::new(start_s, end_s, BoundaryDirection::Left));
        }
        if let Some(start_s) = right_run {
            errors.push(RoadTooWideViolation::new(start_s, end_s, BoundaryDirection::Right));
        }

        success
    }

    fn advance_run(
        run: &mut Option<f64>,
        violated: bool,
        s: f64,
        direction: BoundaryDirection,
        errors: &mut Vec<RoadTooWideViolation>,
        success: &mut bool,
    ) {
        match (*run, violated) {
            (None, true) => {
                *run = Some(s);
                *success = false;
            }
            (Some(start_s), false) => {
                errors.push(RoadTooWideViolation::new(start_s, s, direction));
                *run = None;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::map::XodrMap;

    use super::*;

    fn single_road_map(plan_view: &str, left_width: &str, right_width: &str) -> XodrMap {
        let text = format!(
            r#"<OpenDRIVE>
                 <header/>
                 <road name="r" id="1" junction="-1" length="20">
                   <planView>{}</planView>
                   <lanes>
                     <laneSection s="0">
                       <left>
                         <lane id="1" type="driving">{}</lane>
                       </left>
                       <center><lane id="0" type="none"/></center>
                       <right>
                         <lane id="-1" type="driving">{}</lane>
                       </right>
                     </laneSection>
                   </lanes>
                 </road>
               </OpenDRIVE>"#,
            plan_view, left_width, right_width
        );
        XodrMap::from_text(&text).unwrap().extract_value().unwrap()
    }

    const STRAIGHT: &str = r#"<geometry s="0" x="0" y="0" hdg="0" length="20"><line/></geometry>"#;
    const LEFT_ARC: &str = r#"<geometry s="0" x="0" y="0" hdg="0" length="20"><arc curvature="0.1"/></geometry>"#;
    const RIGHT_ARC: &str = r#"<geometry s="0" x="0" y="0" hdg="0" length="20"><arc curvature="-0.1"/></geometry>"#;

    fn constant_width(width: f64) -> String {
        format!(r#"<width sOffset="0" a="{}" b="0" c="0" d="0"/>"#, width)
    }

    #[test]
    fn straight_roads_are_never_too_wide() {
        let map = single_road_map(STRAIGHT, &constant_width(50.0), &constant_width(50.0));
        let validator = RoadWidthValidator::new(&map.roads()[0], 1.0);
        let mut errors = Vec::new();
        assert!(validator.validate_road_width(&mut errors));
        assert!(errors.is_empty());
    }

    #[test]
    fn lanes_wider_than_the_curvature_radius_violate() {
        // Radius 10; the 12m left lane sweeps past the center of curvature,
        // the 2m right lane is on the outside of the curve and is fine.
        let map = single_road_map(LEFT_ARC, &constant_width(12.0), &constant_width(2.0));
        let validator = RoadWidthValidator::new(&map.roads()[0], 1.0);
        let mut errors = Vec::new();
        assert!(!validator.validate_road_width(&mut errors));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].direction, BoundaryDirection::Left);
        assert_relative_eq!(errors[0].start_s, 0.0);
        assert_relative_eq!(errors[0].end_s, 20.0);
    }

    #[test]
    fn right_side_violations_on_clockwise_curves() {
        let map = single_road_map(RIGHT_ARC, &constant_width(2.0), &constant_width(12.0));
        let validator = RoadWidthValidator::new(&map.roads()[0], 1.0);
        let mut errors = Vec::new();
        assert!(!validator.validate_road_width(&mut errors));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].direction, BoundaryDirection::Right);
    }

    #[test]
    fn violation_intervals_follow_the_width_curve() {
        // The left lane only becomes too wide from s=10 onwards.
        let left = r#"<width sOffset="0" a="2" b="0" c="0" d="0"/>
                      <width sOffset="10" a="12" b="0" c="0" d="0"/>"#;
        let map = single_road_map(LEFT_ARC, left, &constant_width(2.0));
        let validator = RoadWidthValidator::new(&map.roads()[0], 1.0);
        let mut errors = Vec::new();
        assert!(!validator.validate_road_width(&mut errors));

        assert_eq!(errors.len(), 1);
        assert_relative_eq!(errors[0].start_s, 10.0);
        assert_relative_eq!(errors[0].end_s, 20.0);
        assert!(errors[0].description().contains("left"));
    }
}
