//! # 吸收与多重散射数值核
//!
//! 在样品截面上做数值积分:
//! - 衰减因子 A(μ, 2θ) = ⟨exp(-μ (l_in + l_out))⟩，入射束沿 +x，出射方向在水平面内
//! - 逃逸概率 P_esc(μ) = ⟨exp(-μ l)⟩，对样品内各点和各向同性方向取平均
//!
//! 圆柱按无限长处理（只在中平面取点，给定高度时截断竖直方向路径），
//! 球在三维网格上取点。长度单位 cm，μ 单位 1/cm。
//!
//! ## 依赖关系
//! - 被 `reduction/correction.rs` 使用
//! - 使用 `models/geometry.rs`

use crate::models::Shape;

use std::f64::consts::PI;

/// 圆柱截面每个方向上的网格点数
const CYLINDER_GRID: usize = 32;
/// 球每个方向上的网格点数
const SPHERE_GRID: usize = 14;
/// 逃逸概率的方向数（Fibonacci 球面）
const ESCAPE_DIRECTIONS: usize = 64;

type Vec3 = [f64; 3];

fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// 样品形状上的积分核
pub struct AbsorptionKernel {
    shape: Shape,
    radius: f64,
    height: Option<f64>,
    points: Vec<Vec3>,
    /// 每个点沿 -x 到表面的距离
    incoming: Vec<f64>,
    /// 每个（点, 方向）对到表面的距离
    escape_paths: Vec<f64>,
}

impl AbsorptionKernel {
    pub fn new(shape: Shape, radius: f64, height: Option<f64>) -> Self {
        let mut kernel = Self {
            shape,
            radius,
            height,
            points: Vec::new(),
            incoming: Vec::new(),
            escape_paths: Vec::new(),
        };
        kernel.points = kernel.grid();
        kernel.incoming = kernel
            .points
            .iter()
            .map(|p| kernel.path_to_surface(p, &[-1.0, 0.0, 0.0]))
            .collect();
        let directions = fibonacci_sphere(ESCAPE_DIRECTIONS);
        kernel.escape_paths = kernel
            .points
            .iter()
            .flat_map(|p| directions.iter().map(|d| kernel.path_to_surface(p, d)))
            .collect();
        kernel
    }

    fn grid(&self) -> Vec<Vec3> {
        let r = self.radius;
        let n = match self.shape {
            Shape::Cylinder => CYLINDER_GRID,
            Shape::Sphere => SPHERE_GRID,
        };
        let step = 2.0 * r / n as f64;
        let coord = |i: usize| -r + (i as f64 + 0.5) * step;

        let mut points = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let (x, y) = (coord(i), coord(j));
                match self.shape {
                    Shape::Cylinder => {
                        if x * x + y * y < r * r {
                            points.push([x, y, 0.0]);
                        }
                    }
                    Shape::Sphere => {
                        for k in 0..n {
                            let z = coord(k);
                            if x * x + y * y + z * z < r * r {
                                points.push([x, y, z]);
                            }
                        }
                    }
                }
            }
        }
        points
    }

    /// 从 p 沿单位方向 d 到样品表面的距离
    fn path_to_surface(&self, p: &Vec3, d: &Vec3) -> f64 {
        let r2 = self.radius * self.radius;
        match self.shape {
            Shape::Cylinder => {
                // 水平面内求与圆的交点，t 即三维路径长度
                let a = d[0] * d[0] + d[1] * d[1];
                let radial = if a == 0.0 {
                    f64::INFINITY
                } else {
                    let b = p[0] * d[0] + p[1] * d[1];
                    let c = p[0] * p[0] + p[1] * p[1] - r2;
                    (-b + (b * b - a * c).max(0.0).sqrt()) / a
                };
                match self.height {
                    Some(h) if d[2] != 0.0 => {
                        radial.min((0.5 * h - p[2] * d[2].signum()) / d[2].abs())
                    }
                    _ => radial,
                }
            }
            Shape::Sphere => {
                let b = dot(p, d);
                let c = dot(p, p) - r2;
                -b + (b * b - c).max(0.0).sqrt()
            }
        }
    }

    /// 衰减因子 A
    pub fn attenuation(&self, mu: f64, two_theta_deg: f64) -> f64 {
        if self.points.is_empty() {
            return 1.0;
        }
        let angle = two_theta_deg.to_radians();
        let out = [angle.cos(), angle.sin(), 0.0];
        let total: f64 = self
            .points
            .iter()
            .zip(&self.incoming)
            .map(|(p, l_in)| (-mu * (l_in + self.path_to_surface(p, &out))).exp())
            .sum();
        total / self.points.len() as f64
    }

    /// 各向同性逃逸概率
    pub fn escape_probability(&self, mu: f64) -> f64 {
        if self.escape_paths.is_empty() {
            return 1.0;
        }
        let total: f64 = self.escape_paths.iter().map(|l| (-mu * l).exp()).sum();
        total / self.escape_paths.len() as f64
    }
}

/// 球面上近似均匀分布的单位向量
fn fibonacci_sphere(n: usize) -> Vec<Vec3> {
    let golden = PI * (3.0 - 5.0_f64.sqrt());
    (0..n)
        .map(|i| {
            let z = 1.0 - (2.0 * i as f64 + 1.0) / n as f64;
            let rho = (1.0 - z * z).sqrt();
            let phi = golden * i as f64;
            [rho * phi.cos(), rho * phi.sin(), z]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparent_sample() {
        let kernel = AbsorptionKernel::new(Shape::Cylinder, 0.3, Some(4.0));
        assert!((kernel.attenuation(0.0, 90.0) - 1.0).abs() < 1e-12);
        assert!((kernel.escape_probability(0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_attenuation_decreases_with_mu() {
        for shape in [Shape::Cylinder, Shape::Sphere] {
            let kernel = AbsorptionKernel::new(shape, 0.5, Some(4.0));
            let weak = kernel.attenuation(0.1, 90.0);
            let strong = kernel.attenuation(1.0, 90.0);
            assert!(weak < 1.0 && strong < weak && strong > 0.0);
        }
    }

    #[test]
    fn test_forward_path_equals_diameter() {
        // 2θ = 0 时 l_in + l_out 恒等于该高度处的弦长
        let kernel = AbsorptionKernel::new(Shape::Sphere, 1.0, None);
        let p = [0.0, 0.0, 0.0];
        let through = kernel.path_to_surface(&p, &[-1.0, 0.0, 0.0])
            + kernel.path_to_surface(&p, &[1.0, 0.0, 0.0]);
        assert!((through - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_sphere_mean_chord_small_mu() {
        // 小 μ 极限: 1 - A ≈ μ⟨l_in + l_out⟩，球内均匀点到表面的平均距离为 3R/4
        let kernel = AbsorptionKernel::new(Shape::Sphere, 1.0, None);
        let mu = 1e-4;
        let loss = (1.0 - kernel.attenuation(mu, 90.0)) / mu;
        assert!((loss - 1.5).abs() < 0.1, "loss = {}", loss);
    }
}
