// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Reads the port list of an Icestudio subproject's top module so the
//! planner can tell whether two subprojects are interchangeable.

use std::{collections::HashMap, fmt};

use camino::Utf8Path;
use snafu::OptionExt;
use sv_parser::{self as sv, Locate, RefNode, unwrap_node};

use crate::{
    error::{InterfaceSnafu, Result},
    scan::Subproject,
};

/// File Icestudio writes the top module into.
pub const TOP_MODULE_FILE: &str = "main.v";

/// <https://www.digikey.com/en/maker/blogs/2024/verilog-ports-part-7-of-our-verilog-journey>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
    Inout,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
            PortDirection::Inout => "inout",
        }
        .fmt(f)
    }
}

impl From<&sv::PortDirection> for PortDirection {
    fn from(direction: &sv::PortDirection) -> Self {
        match direction {
            sv::PortDirection::Input(_) => Self::Input,
            sv::PortDirection::Output(_) => Self::Output,
            sv::PortDirection::Inout(_) | sv::PortDirection::Ref(_) => {
                Self::Inout
            }
        }
    }
}

/// The name and ports of a module, ports in the order of the module header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInterface {
    pub name: String,
    pub ports: Vec<(String, PortDirection)>,
}

impl ModuleInterface {
    /// Two top modules are interchangeable when a testbench written for one
    /// instantiates the other unchanged: same module name, same ports in the
    /// same order and direction.
    pub fn is_compatible_with(&self, other: &ModuleInterface) -> bool {
        self == other
    }
}

impl fmt::Display for ModuleInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module {}(", self.name)?;
        for (index, (port, direction)) in self.ports.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{direction} {port}")?;
        }
        write!(f, ")")
    }
}

/// Reads the interface of `subproject`'s top module, taken from `main.v` if
/// the subproject has one and from its first source otherwise.
pub fn read_interface(subproject: &Subproject) -> Result<ModuleInterface> {
    let preferred = subproject.directory.join(TOP_MODULE_FILE);
    let top_file = subproject
        .sources
        .iter()
        .find(|source| **source == preferred)
        .or_else(|| subproject.sources.first())
        .context(InterfaceSnafu {
            path: &subproject.directory,
            message: "the subproject has no Verilog sources",
        })?;

    read_module_interface(top_file)
}

/// Reads the interface of the first module declared in `path`. Includes are
/// not followed.
pub fn read_module_interface(path: &Utf8Path) -> Result<ModuleInterface> {
    let defines: HashMap<String, Option<sv::Define>> = HashMap::new();
    let include_directories: &[&str] = &[];
    let (ast, _) =
        sv::parse_sv(path, &defines, include_directories, true, false)
            .map_err(|error| {
                InterfaceSnafu {
                    path,
                    message: error.to_string(),
                }
                .build()
            })?;

    for node in &ast {
        let interface = match node {
            RefNode::ModuleDeclarationAnsi(module) => {
                collect_interface(&ast, module)
            }
            RefNode::ModuleDeclarationNonansi(module) => {
                collect_interface(&ast, module)
            }
            _ => continue,
        };
        return interface.context(InterfaceSnafu {
            path,
            message: "the module name could not be traced back to source code",
        });
    }

    InterfaceSnafu {
        path,
        message: "no module declaration found",
    }
    .fail()
}

// taken from https://github.com/dalance/sv-parser/blob/master/README.md
fn get_identifier(node: RefNode) -> Option<Locate> {
    match unwrap_node!(node, SimpleIdentifier, EscapedIdentifier) {
        Some(RefNode::SimpleIdentifier(x)) => Some(x.nodes.0),
        Some(RefNode::EscapedIdentifier(x)) => Some(x.nodes.0),
        _ => None,
    }
}

fn collect_interface<'a, N>(
    ast: &sv::SyntaxTree,
    module: N,
) -> Option<ModuleInterface>
where
    N: IntoIterator<Item = RefNode<'a>> + Copy,
{
    let name = unwrap_node!(module, ModuleIdentifier)
        .and_then(get_identifier)
        .and_then(|id| ast.get_str_trim(&id))?
        .to_string();

    let mut ports = vec![];
    // non-ANSI headers fix the order, body declarations give the directions
    let mut header = vec![];
    let mut declared = HashMap::new();
    // ANSI ports without a direction keep the previous port's direction
    let mut direction = PortDirection::Inout;
    for node in module {
        match node {
            RefNode::AnsiPortDeclaration(port) => {
                if let Some(RefNode::PortDirection(keyword)) =
                    unwrap_node!(port, PortDirection)
                {
                    direction = keyword.into();
                }
                if let Some(port_name) = unwrap_node!(port, PortIdentifier)
                    .and_then(get_identifier)
                    .and_then(|id| ast.get_str_trim(&id))
                {
                    ports.push((port_name.to_string(), direction));
                }
            }
            RefNode::ListOfPorts(list) => {
                for node in list {
                    if let RefNode::Port(port) = node {
                        if let Some(port_name) =
                            unwrap_node!(port, PortIdentifier)
                                .and_then(get_identifier)
                                .and_then(|id| ast.get_str_trim(&id))
                        {
                            header.push(port_name.to_string());
                        }
                    }
                }
            }
            RefNode::InputDeclaration(declaration) => {
                declare(ast, declaration, PortDirection::Input, &mut declared)
            }
            RefNode::OutputDeclaration(declaration) => declare(
                ast,
                declaration,
                PortDirection::Output,
                &mut declared,
            ),
            RefNode::InoutDeclaration(declaration) => {
                declare(ast, declaration, PortDirection::Inout, &mut declared)
            }
            _ => {}
        }
    }

    ports.extend(header.into_iter().map(|port_name| {
        let direction = declared
            .get(&port_name)
            .copied()
            .unwrap_or(PortDirection::Inout);
        (port_name, direction)
    }));

    Some(ModuleInterface { name, ports })
}

fn declare<'a, N>(
    ast: &sv::SyntaxTree,
    declaration: N,
    direction: PortDirection,
    declared: &mut HashMap<String, PortDirection>,
) where
    N: IntoIterator<Item = RefNode<'a>>,
{
    for node in declaration {
        if let RefNode::PortIdentifier(identifier) = node {
            if let Some(port_name) =
                get_identifier(RefNode::PortIdentifier(identifier))
                    .and_then(|id| ast.get_str_trim(&id))
            {
                declared.insert(port_name.to_string(), direction);
            }
        }
    }
}
