//! # material 命令实现
//!
//! 打印化学式的中子散射常数；给出密度与几何时还打印数密度、
//! 宏观截面和束流中的原子数。
//!
//! ## 依赖关系
//! - 使用 `cli/material.rs` 定义的参数
//! - 使用 `neutron/`、`reduction/structure_factor.rs`

use crate::cli::material::MaterialArgs;
use crate::error::Result;
use crate::models::SampleGeometry;
use crate::neutron::{Material, SampleMaterial};
use crate::reduction::structure_factor::ScatteringConstants;
use crate::utils::output;

use tabled::{Table, Tabled};

/// 元素组成行
#[derive(Debug, Clone, Tabled)]
struct AtomRow {
    #[tabled(rename = "Element")]
    symbol: String,
    #[tabled(rename = "Count")]
    count: String,
}

/// 常数表格行
#[derive(Debug, Clone, Tabled)]
struct ConstantRow {
    #[tabled(rename = "Quantity")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl ConstantRow {
    fn new(name: &str, value: String) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// 执行 material 命令
pub fn execute(args: MaterialArgs) -> Result<()> {
    output::print_header(&format!("Material {}", args.formula));

    let material = Material::from_formula(&args.formula)?;
    let atoms: Vec<AtomRow> = material
        .atoms
        .iter()
        .map(|a| AtomRow {
            symbol: a.symbol.clone(),
            count: format!("{}", a.count),
        })
        .collect();
    println!("{}", Table::new(&atoms));
    println!();

    let rows = constant_rows(&material, &args)?;
    println!("{}", Table::new(&rows));
    Ok(())
}

fn constant_rows(material: &Material, args: &MaterialArgs) -> Result<Vec<ConstantRow>> {
    let mut rows = vec![
        ConstantRow::new(
            "Relative molecular mass",
            format!("{:.4}", material.relative_molecular_mass()),
        ),
        ConstantRow::new(
            "<b> (fm)",
            format!("{:.6}", material.coh_scatter_length()),
        ),
        ConstantRow::new(
            "<b^2> (fm^2)",
            format!("{:.6}", material.total_scatter_length_sqrd()),
        ),
        ConstantRow::new(
            "Total scattering xs (b)",
            format!("{:.6}", material.total_scatter_xsection()),
        ),
        ConstantRow::new(
            &format!("Absorption xs at {} Å (b)", args.wavelength),
            format!("{:.6}", material.absorb_xsection(args.wavelength)),
        ),
    ];

    match ScatteringConstants::of(material) {
        Ok(constants) => rows.push(ConstantRow::new(
            "Laue term <b^2>/<b>^2",
            format!("{:.6}", constants.laue_term()),
        )),
        Err(e) => output::print_warning(&e.to_string()),
    }

    let Some(density) = args.density else {
        return Ok(rows);
    };
    let geometry = SampleGeometry {
        shape: args.shape.into(),
        radius: args.radius,
        height: args.height,
    };
    let sample = SampleMaterial::new(material.clone(), density, args.packing, Some(geometry));
    rows.push(ConstantRow::new(
        "Number density (f.u./cm^3)",
        format!("{:.6e}", sample.number_density()),
    ));
    rows.push(ConstantRow::new(
        "mu_s (1/cm)",
        format!("{:.6}", sample.scattering_coefficient()),
    ));
    rows.push(ConstantRow::new(
        &format!("mu_a at {} Å (1/cm)", args.wavelength),
        format!("{:.6}", sample.absorption_coefficient(args.wavelength)),
    ));

    if args.radius.is_some() {
        rows.push(ConstantRow::new(
            "Atoms in beam",
            format!("{:.6e}", sample.number_atoms()?),
        ));
    }
    Ok(rows)
}
