//! Project file generation for external builds.

use quick_xml::escape::escape;

use crate::resolve::PackageRequest;

/// Settings written into the generated `.csproj`.
#[derive(Debug, Clone)]
pub struct ProjectConfig<'a> {
    /// Assembly name of the produced artifact.
    pub assembly_name: &'a str,
    /// Target framework moniker (e.g. "net8.0").
    pub target_framework: &'a str,
    /// MSBuild output type.
    pub output_type: &'a str,
    /// Enable implicit global usings.
    pub implicit_usings: bool,
    /// Nullable reference type context.
    pub nullable: bool,
    /// Warning codes elevated to errors.
    pub warnings_as_errors: &'a [String],
}

impl<'a> ProjectConfig<'a> {
    /// A console executable for the given framework.
    pub fn console(assembly_name: &'a str, target_framework: &'a str) -> Self {
        Self {
            assembly_name,
            target_framework,
            output_type: "Exe",
            implicit_usings: true,
            nullable: false,
            warnings_as_errors: &[],
        }
    }
}

fn flag(enabled: bool) -> &'static str {
    if enabled { "enable" } else { "disable" }
}

/// Generate an SDK-style project file.
pub fn generate_csproj(config: &ProjectConfig<'_>, packages: &[PackageRequest]) -> String {
    let mut xml = String::new();

    xml.push_str("<Project Sdk=\"Microsoft.NET.Sdk\">\n\n");

    xml.push_str("  <PropertyGroup>\n");
    xml.push_str(&format!(
        "    <OutputType>{}</OutputType>\n",
        escape(config.output_type)
    ));
    xml.push_str(&format!(
        "    <TargetFramework>{}</TargetFramework>\n",
        escape(config.target_framework)
    ));
    xml.push_str(&format!(
        "    <ImplicitUsings>{}</ImplicitUsings>\n",
        flag(config.implicit_usings)
    ));
    xml.push_str(&format!("    <Nullable>{}</Nullable>\n", flag(config.nullable)));
    xml.push_str(&format!(
        "    <AssemblyName>{}</AssemblyName>\n",
        escape(config.assembly_name)
    ));
    if !config.warnings_as_errors.is_empty() {
        xml.push_str(&format!(
            "    <WarningsAsErrors>{}</WarningsAsErrors>\n",
            escape(&config.warnings_as_errors.join(";"))
        ));
    }
    xml.push_str("  </PropertyGroup>\n");

    if !packages.is_empty() {
        xml.push_str("\n  <ItemGroup>\n");
        for package in packages {
            xml.push_str(&format!(
                "    <PackageReference Include=\"{}\" Version=\"{}\" />\n",
                escape(&package.id),
                escape(&package.version.to_string())
            ));
        }
        xml.push_str("  </ItemGroup>\n");
    }

    xml.push_str("\n</Project>\n");
    xml
}
