//! Visual Studio 2010 and 2012 backends.
//!
//! Both versions share one generator parameterized by [`VsVersion`]. Every target becomes a `.vcxproj` project with a `.vcxproj.filters`
//! companion, and every module becomes a `.sln` solution listing its
//! projects. Projects are identified by stable GUIDs so that regenerating
//! keeps IDE state valid. MSBuild has no notion of the model's variables, so
//! references are expanded before values are rendered.

use super::lower::{LoweredNode, describe, lower_target};
use super::xml::{Node, XmlFormatter};
use super::{Backend, GenerateError, GenerationReport};
use crate::expr::{BoolOperator, Dialect, Expr, ExprFormatter, PathAnchors, PathExpr};
use crate::guid::Guid;
use crate::model::{Module, ModelError, Owner, Project, Target, TargetKind};
use crate::output::{LineEnding, OutputFile};
use crate::props::{PropertiesRegistry, Property, PropertyType, Scope};
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use std::fmt::{self, Display, Formatter};

const CONFIGURATIONS: [&str; 2] = ["Debug", "Release"];
const PLATFORM: &str = "Win32";
const MSBUILD_XMLNS: &str = "http://schemas.microsoft.com/developer/msbuild/2003";
/// Project type GUID of Visual C++ projects in solutions.
const VC_PROJECT_TYPE: &str = "{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}";

/// Format details that differ between Visual Studio versions.
#[derive(Debug)]
pub(super) struct VsVersion {
    backend: Backend,
    /// Solution file format version.
    format_version: &'static str,
    /// Release year shown in the solution header.
    year: &'static str,
    /// Toolset named in configuration groups, if the version needs one.
    platform_toolset: Option<&'static str>,
    /// Fallback for `VCTargetsPath` when the project is opened by an older
    /// MSBuild, if the version needs one.
    targets_path: Option<&'static str>,
    solutionfile: &'static str,
    projectfile: &'static str,
    guid: &'static str,
    subsystem: &'static str,
}

pub(super) const VS2010: VsVersion = VsVersion {
    backend: Backend::Vs2010,
    format_version: "11.00",
    year: "2010",
    platform_toolset: None,
    targets_path: None,
    solutionfile: "vs2010.solutionfile",
    projectfile: "vs2010.projectfile",
    guid: "vs2010.guid",
    subsystem: "vs2010.subsystem",
};

pub(super) const VS2012: VsVersion = VsVersion {
    backend: Backend::Vs2012,
    format_version: "12.00",
    year: "2012",
    platform_toolset: Some("v110"),
    targets_path: Some("$(VCTargetsPath11)"),
    solutionfile: "vs2012.solutionfile",
    projectfile: "vs2012.projectfile",
    guid: "vs2012.guid",
    subsystem: "vs2012.subsystem",
};

/// Expression dialect of MSBuild files.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsBuildDialect;

impl Dialect for MsBuildDialect {
    fn name(&self) -> &str {
        "vs2010"
    }

    fn reference(&self, var: &str) -> String {
        format!("$({var})")
    }

    fn list_separator(&self) -> &str {
        ";"
    }

    fn condition(&self, operator: BoolOperator, left: &str, right: Option<&str>) -> Option<String> {
        let right = right.unwrap_or_default();
        Some(match operator {
            BoolOperator::Equal => format!("'{left}'=='{right}'"),
            BoolOperator::NotEqual => format!("'{left}'!='{right}'"),
            BoolOperator::And => format!("({left}) and ({right})"),
            BoolOperator::Or => format!("({left}) or ({right})"),
            BoolOperator::Not => format!("!({left})"),
        })
    }
}

fn solution_beside_source(owner: Owner<'_>) -> Expr {
    match owner {
        Owner::Module { module, .. } | Owner::Target { module, .. } => {
            module.path_beside_source(&format!("{}.sln", module.stem()))
        }
        Owner::Project(_) => Expr::empty_list(),
    }
}

fn project_beside_source(owner: Owner<'_>) -> Expr {
    match owner {
        Owner::Target { module, target, .. } => {
            module.path_beside_source(&format!("{}.vcxproj", target.name))
        }
        Owner::Module { .. } | Owner::Project(_) => Expr::empty_list(),
    }
}

fn stable_guid(owner: Owner<'_>) -> Expr {
    match owner {
        Owner::Target {
            project, target, ..
        } => Expr::literal(Guid::for_target(&project.name, &target.name).braced()),
        Owner::Module { .. } | Owner::Project(_) => Expr::empty_list(),
    }
}

pub(super) fn properties(version: &VsVersion, scope: Scope) -> Vec<Property> {
    match scope {
        Scope::Module => vec![
            Property::new(
                version.solutionfile,
                PropertyType::Path,
                "Solution file for the module; `<module>.sln` beside it by default.",
            )
            .derived(solution_beside_source),
        ],
        Scope::AllTargets => vec![
            Property::new(
                version.projectfile,
                PropertyType::Path,
                "Project file for the target; `<name>.vcxproj` beside the module by default.",
            )
            .derived(project_beside_source),
            Property::new(
                version.guid,
                PropertyType::String,
                "GUID of the project; derived from the project and target names by default.",
            )
            .derived(stable_guid),
        ],
        Scope::Kind(TargetKind::Exe) => vec![
            Property::new(
                version.subsystem,
                PropertyType::Enum(&["console", "windows"]),
                "Linker subsystem of the executable.",
            )
            .with_default(Expr::literal("console")),
        ],
        Scope::Project | Scope::Kind(_) => Vec::new(),
    }
}

/// `'$(Configuration)|$(Platform)'=='<config>|Win32'`
fn config_condition(config: &str) -> Expr {
    Expr::equal(
        Expr::concat(vec![
            Expr::reference("Configuration"),
            Expr::literal("|"),
            Expr::reference("Platform"),
        ]),
        Expr::literal(format!("{config}|{PLATFORM}")),
    )
}

struct Context<'a> {
    owner: Owner<'a>,
    registry: &'a PropertiesRegistry,
    version: &'a VsVersion,
}

impl Context<'_> {
    fn model_error(&self, source: ModelError) -> GenerateError {
        GenerateError::Model {
            owner: describe(self.owner),
            source,
        }
    }

    /// Value of `name` with every reference expanded.
    fn expanded(&self, name: &str) -> Result<Expr, GenerateError> {
        let value = self
            .owner
            .value(self.registry, name)
            .map_err(|err| self.model_error(err))?;
        self.owner
            .expand(self.registry, &value)
            .map_err(|err| self.model_error(err))
    }

    fn text(&self, name: &str) -> Result<String, GenerateError> {
        let value = self.expanded(name)?;
        value.literal_text().ok_or_else(|| {
            self.model_error(ModelError::InvalidValue {
                name: name.to_owned(),
                reason: String::from("expected plain text"),
                pos: value.position().cloned().unwrap_or_else(|| self.owner.position()),
            })
        })
    }

    /// Path value of `name` together with its native location.
    fn location(&self, name: &str) -> Result<(PathExpr, Utf8PathBuf), GenerateError> {
        let Expr::Path(path) = self.expanded(name)? else {
            return Err(self.model_error(ModelError::InvalidValue {
                name: name.to_owned(),
                reason: String::from("expected a path"),
                pos: self.owner.position(),
            }));
        };
        let native = PathAnchors::new('\\', "", self.owner.project().top_srcdir.clone())
            .native_path(&path)
            .map_err(|source| GenerateError::Format {
                owner: describe(self.owner),
                source,
            })?;
        Ok((path, native))
    }
}

/// A project as listed in its solution.
#[derive(Debug, Clone)]
struct SolutionEntry {
    name: String,
    projectfile: PathExpr,
    guid: String,
}

/// Files generated for one target.
#[derive(Debug)]
struct ProjectFiles {
    project: OutputFile,
    filters: OutputFile,
    entry: SolutionEntry,
}

fn configuration_type(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::Exe => "Application",
        TargetKind::Library => "StaticLibrary",
        TargetKind::Action => "Utility",
    }
}

fn item_kind(file: &str) -> &'static str {
    let ext = file
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "c" | "cc" | "cpp" | "cxx" => "ClCompile",
        "h" | "hh" | "hpp" | "hxx" | "inl" => "ClInclude",
        "rc" => "ResourceCompile",
        _ => "None",
    }
}

fn standard_defines(kind: TargetKind, config: &str) -> String {
    let mut defs = String::from(if config == "Debug" {
        "WIN32;_DEBUG"
    } else {
        "WIN32;NDEBUG"
    });
    match kind {
        TargetKind::Exe => defs.push_str(";_CONSOLE"),
        TargetKind::Library => defs.push_str(";_LIB"),
        TargetKind::Action => {}
    }
    defs.push_str(";%(PreprocessorDefinitions)");
    defs
}

fn subsystem(ctx: &Context<'_>, kind: TargetKind) -> Result<&'static str, GenerateError> {
    if kind != TargetKind::Exe {
        return Ok("Windows");
    }
    Ok(match ctx.text(ctx.version.subsystem)?.as_str() {
        "windows" => "Windows",
        _ => "Console",
    })
}

fn item_definitions(
    ctx: &Context<'_>,
    kind: TargetKind,
    config: &str,
    commands: &[String],
) -> Result<Node, GenerateError> {
    let mut group = Node::new("ItemDefinitionGroup").with_attr("Condition", config_condition(config));
    if kind.compiles_sources() {
        let mut compile = Node::new("ClCompile");
        compile.add_value("WarningLevel", "Level3");
        if config == "Debug" {
            compile.add_value("Optimization", "Disabled");
        } else {
            compile.add_value("Optimization", "MaxSpeed");
            compile.add_value("FunctionLevelLinking", true);
            compile.add_value("IntrinsicFunctions", true);
        }
        let mut defines = ctx.expanded("defines")?.items().to_vec();
        defines.push(Expr::literal(standard_defines(kind, config)));
        compile.add_value("PreprocessorDefinitions", Expr::list(defines));
        compile.add_value("AdditionalIncludeDirectories", ctx.expanded("includedirs")?);
        group.add_node(compile);

        let mut link = Node::new("Link");
        link.add_value("SubSystem", subsystem(ctx, kind)?);
        link.add_value("GenerateDebugInformation", true);
        if config == "Release" {
            link.add_value("EnableCOMDATFolding", true);
            link.add_value("OptimizeReferences", true);
        }
        group.add_node(link);
    }
    if !commands.is_empty() {
        let mut event = Node::new("PostBuildEvent");
        event.add_value("Command", commands.join("\n"));
        group.add_node(event);
    }
    Ok(group)
}

fn project_references(ctx: &Context<'_>, node: &LoweredNode) -> Result<Option<Node>, GenerateError> {
    if node.deps.is_empty() {
        return Ok(None);
    }
    let project = ctx.owner.project();
    let mut group = Node::new("ItemGroup");
    for dep in &node.deps {
        let Some((module, target)) = project.get_target(&dep.target) else {
            continue;
        };
        let dep_ctx = Context {
            owner: Owner::Target {
                project,
                module,
                target,
            },
            registry: ctx.registry,
            version: ctx.version,
        };
        let (location, _) = dep_ctx.location(ctx.version.projectfile)?;
        let guid = dep_ctx.text(ctx.version.guid)?;
        let mut reference = Node::new("ProjectReference").with_attr("Include", Expr::Path(location));
        reference.add_value("Project", guid.to_lowercase());
        group.add_node(reference);
    }
    Ok(Some(group))
}

fn project_tree(
    ctx: &Context<'_>,
    target: &Target,
    nodes: &[LoweredNode],
    guid: &str,
) -> Result<Node, GenerateError> {
    let kind = target.kind;
    let root_namespace = nodes.first().map_or(target.name.as_str(), |n| n.name.as_str());
    let commands: Vec<String> = nodes.iter().flat_map(|n| n.commands.iter().cloned()).collect();

    let mut root = Node::new("Project")
        .with_attr("DefaultTargets", "Build")
        .with_attr("ToolsVersion", "4.0")
        .with_attr("xmlns", MSBUILD_XMLNS);

    let mut configs = Node::new("ItemGroup").with_attr("Label", "ProjectConfigurations");
    for config in CONFIGURATIONS {
        let mut item =
            Node::new("ProjectConfiguration").with_attr("Include", format!("{config}|{PLATFORM}"));
        item.add_value("Configuration", config);
        item.add_value("Platform", PLATFORM);
        configs.add_node(item);
    }
    root.add_node(configs);

    let mut globals = Node::new("PropertyGroup").with_attr("Label", "Globals");
    globals.add_value("ProjectGuid", guid);
    globals.add_value("Keyword", "Win32Proj");
    globals.add_value("RootNamespace", root_namespace);
    if let Some(fallback) = ctx.version.targets_path {
        globals.add_node(
            Node::new("VCTargetsPath")
                .with_attr(
                    "Condition",
                    format!(
                        "'{fallback}' != '' and '$(VSVersion)' == '' and $(VisualStudioVersion) == ''"
                    ),
                )
                .with_text(fallback),
        );
    }
    root.add_node(globals);

    root.add_node(
        Node::new("Import").with_attr("Project", "$(VCTargetsPath)\\Microsoft.Cpp.Default.props"),
    );
    for config in CONFIGURATIONS {
        let mut group = Node::new("PropertyGroup")
            .with_attr("Condition", config_condition(config))
            .with_attr("Label", "Configuration");
        group.add_value("ConfigurationType", configuration_type(kind));
        group.add_value("UseDebugLibraries", config == "Debug");
        group.add_value("CharacterSet", "Unicode");
        if let Some(toolset) = ctx.version.platform_toolset {
            group.add_value("PlatformToolset", toolset);
        }
        root.add_node(group);
    }
    root.add_node(Node::new("Import").with_attr("Project", "$(VCTargetsPath)\\Microsoft.Cpp.props"));
    root.add_node(Node::new("ImportGroup").with_attr("Label", "ExtensionSettings"));
    for config in CONFIGURATIONS {
        let mut sheets = Node::new("ImportGroup")
            .with_attr("Label", "PropertySheets")
            .with_attr("Condition", config_condition(config));
        sheets.add_node(
            Node::new("Import")
                .with_attr("Project", "$(UserRootDir)\\Microsoft.Cpp.$(Platform).user.props")
                .with_attr(
                    "Condition",
                    "exists('$(UserRootDir)\\Microsoft.Cpp.$(Platform).user.props')",
                )
                .with_attr("Label", "LocalAppDataPlatform"),
        );
        root.add_node(sheets);
    }
    root.add_node(Node::new("PropertyGroup").with_attr("Label", "UserMacros"));
    if kind == TargetKind::Exe {
        for config in CONFIGURATIONS {
            let mut group = Node::new("PropertyGroup").with_attr("Condition", config_condition(config));
            group.add_value("LinkIncremental", config == "Debug");
            root.add_node(group);
        }
    }
    for config in CONFIGURATIONS {
        root.add_node(item_definitions(ctx, kind, config, &commands)?);
    }

    let mut items: IndexMap<&str, Node> = IndexMap::new();
    for input in nodes.iter().flat_map(|n| n.inputs.iter()) {
        let item = item_kind(input);
        items
            .entry(item)
            .or_insert_with(|| Node::new("ItemGroup"))
            .add_node(Node::new(item).with_attr("Include", input.as_str()));
    }
    for (_, group) in items {
        root.add_node(group);
    }
    if let Some(node) = nodes.first()
        && let Some(references) = project_references(ctx, node)?
    {
        root.add_node(references);
    }

    root.add_node(Node::new("Import").with_attr("Project", "$(VCTargetsPath)\\Microsoft.Cpp.targets"));
    root.add_node(Node::new("ImportGroup").with_attr("Label", "ExtensionTargets"));
    Ok(root)
}

fn filters_tree() -> Node {
    const FILTERS: [(&str, &str, &str); 3] = [
        (
            "Source Files",
            "{4FC737F1-C7A5-4376-A066-2A32D752A2FF}",
            "cpp;c;cc;cxx;def;odl;idl;hpj;bat;asm;asmx",
        ),
        (
            "Header Files",
            "{93995380-89BD-4b04-88EB-625FBE52EBFB}",
            "h;hpp;hxx;hm;inl;inc;xsd",
        ),
        (
            "Resource Files",
            "{67DA6AB6-F800-4c08-8B7A-83BB121AAD01}",
            "rc;ico;cur;bmp;dlg;rc2;rct;bin;rgs;gif;jpg;jpeg;jpe;resx;tiff;tif;png;wav;mfcribbon-ms",
        ),
    ];
    let mut group = Node::new("ItemGroup");
    for (name, id, extensions) in FILTERS {
        let mut filter = Node::new("Filter").with_attr("Include", name);
        filter.add_value("UniqueIdentifier", id);
        filter.add_value("Extensions", extensions);
        group.add_node(filter);
    }
    let mut root = Node::new("Project")
        .with_attr("ToolsVersion", "4.0")
        .with_attr("xmlns", MSBUILD_XMLNS);
    root.add_node(group);
    root
}

/// Render the project and filters files of `target`.
fn project_files(
    version: &VsVersion,
    project: &Project,
    module: &Module,
    target: &Target,
    registry: &PropertiesRegistry,
) -> Result<ProjectFiles, GenerateError> {
    let ctx = Context {
        owner: Owner::Target {
            project,
            module,
            target,
        },
        registry,
        version,
    };
    let format_error = |source| GenerateError::Format {
        owner: describe(ctx.owner),
        source,
    };
    let (location, path) = ctx.location(version.projectfile)?;
    let outdir = path.parent().map(ToOwned::to_owned).unwrap_or_default();
    let anchors = PathAnchors::new('\\', outdir, project.top_srcdir.clone());
    let fmt = ExprFormatter::new(&MsBuildDialect, &anchors);
    let nodes = lower_target(project, module, target, registry, version.backend, &fmt)?;
    let guid = ctx.text(version.guid)?;

    let xml = XmlFormatter::new(&fmt);
    let tree = project_tree(&ctx, target, &nodes, &guid)?;
    let mut project_file = OutputFile::new(path.clone())
        .with_line_ending(LineEnding::Windows)
        .with_bom();
    project_file.write(&xml.format(&tree).map_err(format_error)?);
    let mut filters = OutputFile::new(format!("{path}.filters"))
        .with_line_ending(LineEnding::Windows)
        .with_bom();
    filters.write(&xml.format(&filters_tree()).map_err(format_error)?);

    Ok(ProjectFiles {
        project: project_file,
        filters,
        entry: SolutionEntry {
            name: target.name.clone(),
            projectfile: location,
            guid,
        },
    })
}

/// Solution listing rendered projects.
struct Solution<'a> {
    version: &'a VsVersion,
    projects: &'a [(String, String, String)],
}

impl Display for Solution<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(
            f,
            "Microsoft Visual Studio Solution File, Format Version {}",
            self.version.format_version
        )?;
        writeln!(f, "# Visual Studio {}", self.version.year)?;
        for (name, file, guid) in self.projects {
            writeln!(f, "Project(\"{VC_PROJECT_TYPE}\") = \"{name}\", \"{file}\", \"{guid}\"")?;
            writeln!(f, "EndProject")?;
        }
        writeln!(f, "Global")?;
        writeln!(f, "\tGlobalSection(SolutionConfigurationPlatforms) = preSolution")?;
        for config in CONFIGURATIONS {
            writeln!(f, "\t\t{config}|{PLATFORM} = {config}|{PLATFORM}")?;
        }
        writeln!(f, "\tEndGlobalSection")?;
        writeln!(f, "\tGlobalSection(ProjectConfigurationPlatforms) = postSolution")?;
        for (_, _, guid) in self.projects {
            for config in CONFIGURATIONS {
                writeln!(f, "\t\t{guid}.{config}|{PLATFORM}.ActiveCfg = {config}|{PLATFORM}")?;
                writeln!(f, "\t\t{guid}.{config}|{PLATFORM}.Build.0 = {config}|{PLATFORM}")?;
            }
        }
        writeln!(f, "\tEndGlobalSection")?;
        writeln!(f, "EndGlobal")
    }
}

fn solution_file(
    ctx: &Context<'_>,
    path: Utf8PathBuf,
    entries: &[SolutionEntry],
) -> Result<OutputFile, GenerateError> {
    let outdir = path.parent().map(ToOwned::to_owned).unwrap_or_default();
    let anchors = PathAnchors::new('\\', outdir, ctx.owner.project().top_srcdir.clone());
    let fmt = ExprFormatter::new(&MsBuildDialect, &anchors);
    let projects = entries
        .iter()
        .map(|entry| {
            let file = fmt
                .format(&Expr::Path(entry.projectfile.clone()))
                .map_err(|source| GenerateError::Format {
                    owner: describe(ctx.owner),
                    source,
                })?;
            Ok((entry.name.clone(), file, entry.guid.clone()))
        })
        .collect::<Result<Vec<_>, GenerateError>>()?;
    let mut file = OutputFile::new(path)
        .with_line_ending(LineEnding::Windows)
        .with_bom();
    file.write(
        &Solution {
            version: ctx.version,
            projects: &projects,
        }
        .to_string(),
    );
    Ok(file)
}

/// Write the projects of every target of `module` and the module's solution.
pub(super) fn generate_module(
    version: &VsVersion,
    project: &Project,
    module: &Module,
    registry: &PropertiesRegistry,
    report: &mut GenerationReport,
) {
    let ctx = Context {
        owner: Owner::Module { project, module },
        registry,
        version,
    };
    let solution = match ctx.location(version.solutionfile) {
        Ok((_, path)) => path,
        Err(err) => {
            report.errors.push(err);
            return;
        }
    };
    let mut entries = Vec::with_capacity(module.targets.len());
    for target in module.targets.values() {
        match project_files(version, project, module, target, registry) {
            Ok(files) => {
                report.commit(files.project);
                report.commit(files.filters);
                entries.push(files.entry);
            }
            Err(err) => report.errors.push(err),
        }
    }
    report.record(solution_file(&ctx, solution, &entries));
}
