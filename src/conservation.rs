//! GERP conservation scores, the built-in field group

use std::fmt;

use crate::compression::{from_scaled, to_scaled, FieldTuple, Scalar};
use crate::error::Result;

/// Conservation scores at a single position
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Conservation {
    /// GERP neutral rate
    pub gerp_n: Option<f64>,
    /// GERP rejected substitutions score
    pub gerp_rs: Option<f64>,
}
impl Conservation {
    #[must_use]
    pub fn new(gerp_n: Option<f64>, gerp_rs: Option<f64>) -> Self {
        Self { gerp_n, gerp_rs }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gerp_n.is_none() && self.gerp_rs.is_none()
    }

    /// Encodes the scores into a scaled tuple
    ///
    /// Fails if a score is outside of the scaled domain.
    pub fn to_tuple(&self) -> Result<FieldTuple> {
        let scale = |v: Option<f64>| -> Result<Option<Scalar>> {
            v.map(|v| to_scaled(v).map(Scalar::Short)).transpose()
        };
        Ok(FieldTuple(vec![scale(self.gerp_n)?, scale(self.gerp_rs)?]))
    }

    /// Decodes a scaled tuple, `None` when both fields are null
    #[must_use]
    pub fn from_tuple(tuple: &FieldTuple) -> Option<Self> {
        let field = |i: usize| match tuple.get(i) {
            Some(Scalar::Short(v)) => Some(from_scaled(v)),
            _ => None,
        };
        let conservation = Self::new(field(0), field(1));
        (!conservation.is_empty()).then_some(conservation)
    }
}

impl fmt::Display for Conservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<f64>| v.map_or_else(|| ".".to_string(), |v| format!("{v:.3}"));
        write!(f, "{}\t{}", show(self.gerp_n), show(self.gerp_rs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_round_trip() {
        let conservation = Conservation::new(Some(4.48), Some(-1.25));
        let tuple = conservation.to_tuple().unwrap();
        assert_eq!(
            tuple,
            FieldTuple(vec![Some(Scalar::Short(4480)), Some(Scalar::Short(-1250))])
        );
        let decoded = Conservation::from_tuple(&tuple).unwrap();
        assert!((decoded.gerp_n.unwrap() - 4.48).abs() < 0.001);
        assert!((decoded.gerp_rs.unwrap() + 1.25).abs() < 0.001);
    }

    #[test]
    fn test_partial_tuple() {
        let tuple = Conservation::new(None, Some(2.0)).to_tuple().unwrap();
        let decoded = Conservation::from_tuple(&tuple).unwrap();
        assert_eq!(decoded.gerp_n, None);
        assert_eq!(decoded.gerp_rs, Some(2.0));
    }

    #[test]
    fn test_null_tuple_is_absent() {
        assert!(Conservation::from_tuple(&FieldTuple::null(2)).is_none());
    }

    #[test]
    fn test_out_of_domain() {
        let result = Conservation::new(Some(40.0), None).to_tuple();
        assert!(result.unwrap_err().is_out_of_domain());
    }

    #[test]
    fn test_display() {
        let conservation = Conservation::new(Some(1.5), None);
        assert_eq!(conservation.to_string(), "1.500\t.");
    }
}
