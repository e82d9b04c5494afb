pub type Vector3 = [f64; 3];

pub fn sub3(left: Vector3, right: Vector3) -> Vector3 {
    [left[0] - right[0], left[1] - right[1], left[2] - right[2]]
}

pub fn scale3(vector: Vector3, factor: f64) -> Vector3 {
    [vector[0] * factor, vector[1] * factor, vector[2] * factor]
}

pub fn dot3(left: Vector3, right: Vector3) -> f64 {
    left[0] * right[0] + left[1] * right[1] + left[2] * right[2]
}

pub fn norm_sq3(vector: Vector3) -> f64 {
    dot3(vector, vector)
}

#[cfg(test)]
mod tests {
    use super::{dot3, norm_sq3, scale3, sub3};

    #[test]
    fn vector_helpers_are_componentwise() {
        let a = [1.0, 2.0, 3.0];
        let b = [0.5, -1.0, 2.0];
        assert_eq!(sub3(a, b), [0.5, 3.0, 1.0]);
        assert_eq!(scale3(a, 2.0), [2.0, 4.0, 6.0]);
        assert_eq!(dot3(a, b), 4.5);
        assert_eq!(norm_sq3(a), 14.0);
    }
}
