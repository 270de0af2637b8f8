//! Build files and source trees for common test scenarios.
//!
//! Every fixture is a CMake-style build file rooted at `/build`, translating
//! sources under `/src`.

use std::path::Path;

use super::MockSourceTree;
use crate::builder::BuildOptions;
use crate::imports::ImportIndex;
use crate::ninja::{NinjaParser, ParseOptions, ParsedNinja};

/// Root of the fixture source trees.
pub const ROOT_DIR: &str = "/src";

/// Build directory of the fixtures.
pub const BUILD_DIR: &str = "/build";

/// A static library and an executable linking it.
pub const LIBRARY_AND_BINARY: &str = r#"
cmake_ninja_workdir = /build/

rule CXX_COMPILER
  command = /usr/bin/c++ $DEFINES $INCLUDES $FLAGS -o $out -c $in
  description = Building CXX object $out

rule CXX_STATIC_LIBRARY_LINKER
  command = $PRE_LINK && /usr/bin/cmake -E rm -f $TARGET_FILE && /usr/bin/ar qc $TARGET_FILE $LINK_FLAGS $in && /usr/bin/ranlib $TARGET_FILE && $POST_BUILD

rule CXX_EXECUTABLE_LINKER
  command = $PRE_LINK && /usr/bin/c++ $FLAGS $LINK_FLAGS $in -o $TARGET_FILE $LINK_PATH $LINK_LIBRARIES && $POST_BUILD

build xar/CMakeFiles/logging.dir/Logging.cpp.o: CXX_COMPILER /src/xar/Logging.cpp
  DEFINES = -DKEEP -DNDEBUG
  FLAGS = -O2 -Wall -DDEF2
  INCLUDES = -I/src

build xar/liblogging.a: CXX_STATIC_LIBRARY_LINKER xar/CMakeFiles/logging.dir/Logging.cpp.o
  TARGET_FILE = xar/liblogging.a
  PRE_LINK = :
  POST_BUILD = :

build xar/CMakeFiles/app.dir/main.cpp.o: CXX_COMPILER /src/xar/main.cpp
  FLAGS = -O2
  INCLUDES = -I/src

build xar/app: CXX_EXECUTABLE_LINKER xar/CMakeFiles/app.dir/main.cpp.o | xar/liblogging.a
  LINK_LIBRARIES = xar/liblogging.a -lpthread
  TARGET_FILE = xar/app
  PRE_LINK = :
  POST_BUILD = :

build logging: phony xar/liblogging.a
build app: phony xar/app
build all: phony logging app
"#;

/// A shared object.
pub const SHARED_LIBRARY: &str = r#"
cmake_ninja_workdir = /build/

rule CXX_COMPILER
  command = /usr/bin/c++ $DEFINES $INCLUDES $FLAGS -o $out -c $in

rule CXX_SHARED_LIBRARY_LINKER
  command = /usr/bin/c++ -fPIC $LINK_FLAGS -shared -Wl,-soname,$SONAME -o $TARGET_FILE $in $LINK_LIBRARIES

build lib/CMakeFiles/foo.dir/foo.cc.o: CXX_COMPILER /src/lib/foo.cc
  FLAGS = -fPIC

build lib/libfoo.so.1: CXX_SHARED_LIBRARY_LINKER lib/CMakeFiles/foo.dir/foo.cc.o
  SONAME = libfoo.so.1
  TARGET_FILE = lib/libfoo.so.1

build all: phony lib/libfoo.so.1
"#;

/// A header generated by a python script, compiled into a library.
pub const CUSTOM_COMMAND: &str = r#"
cmake_ninja_workdir = /build/

rule CUSTOM_COMMAND
  command = $COMMAND
  description = $DESC

rule CXX_COMPILER
  command = /usr/bin/c++ $DEFINES $INCLUDES $FLAGS -o $out -c $in

rule CXX_STATIC_LIBRARY_LINKER
  command = /usr/bin/ar qc $TARGET_FILE $in

build gen/version.h: CUSTOM_COMMAND /src/tools/gen.py /src/tools/version.json
  COMMAND = cd /build/gen && /usr/bin/python3 /src/tools/gen.py --in /src/tools/version.json --out /build/gen/version.h
  DESC = Generating version.h

build core/CMakeFiles/core.dir/core.cc.o: CXX_COMPILER /src/core/core.cc || gen/version.h
  INCLUDES = -I/src -I/build/gen

build core/libcore.a: CXX_STATIC_LIBRARY_LINKER core/CMakeFiles/core.dir/core.cc.o
  TARGET_FILE = core/libcore.a

build all: phony core/libcore.a
"#;

/// protoc generating messages and gRPC stubs for a server binary.
pub const PROTOBUF: &str = r#"
cmake_ninja_workdir = /build/

rule CUSTOM_COMMAND
  command = $COMMAND

rule CXX_COMPILER
  command = /usr/bin/c++ $DEFINES $INCLUDES $FLAGS -o $out -c $in

rule CXX_EXECUTABLE_LINKER
  command = /usr/bin/c++ $FLAGS $in -o $TARGET_FILE $LINK_LIBRARIES

build proto/api.pb.h proto/api.pb.cc proto/api.grpc.pb.h proto/api.grpc.pb.cc: CUSTOM_COMMAND /src/proto/api.proto
  COMMAND = cd /build/proto && /usr/bin/protoc --grpc_out /build --cpp_out /build --plugin=protoc-gen-grpc=/usr/bin/grpc_cpp_plugin -I /src /src/proto/api.proto

build server/CMakeFiles/server.dir/main.cc.o: CXX_COMPILER /src/server/main.cc || proto/api.grpc.pb.h
  INCLUDES = -I/src -I/build

build server/server: CXX_EXECUTABLE_LINKER server/CMakeFiles/server.dir/main.cc.o
  TARGET_FILE = server/server

build all: phony server/server
"#;

/// Sources for [`LIBRARY_AND_BINARY`].
pub fn library_tree() -> MockSourceTree {
    MockSourceTree::new()
        .with_file("/src/xar/Logging.h", "#pragma once\nvoid log();\n")
        .with_file("/src/xar/Logging.cpp", "#include \"xar/Logging.h\"\n")
        .with_file(
            "/src/xar/main.cpp",
            "#include \"xar/Logging.h\"\nint main() { log(); }\n",
        )
        .with_dir(BUILD_DIR)
}

/// Sources for [`CUSTOM_COMMAND`].
pub fn custom_command_tree() -> MockSourceTree {
    MockSourceTree::new()
        .with_file("/src/tools/gen.py", "print('#define VERSION 1')\n")
        .with_file("/src/tools/version.json", "{\"version\": 1}\n")
        .with_file("/src/core/core.cc", "#include \"version.h\"\n")
        .with_dir("/build/gen")
}

/// Sources for [`PROTOBUF`].
pub fn proto_tree() -> MockSourceTree {
    MockSourceTree::new()
        .with_file(
            "/src/proto/api.proto",
            "syntax = \"proto3\";\nimport \"proto/common/types.proto\";\n",
        )
        .with_file(
            "/src/proto/common/types.proto",
            "syntax = \"proto3\";\nimport \"google/protobuf/timestamp.proto\";\n",
        )
        .with_file(
            "/src/server/main.cc",
            "#include \"proto/api.grpc.pb.h\"\nint main() {}\n",
        )
        .with_dir("/build/proto")
}

/// Options matching the fixture layout, without a package prefix.
pub fn build_options() -> BuildOptions {
    BuildOptions {
        root_dir: ROOT_DIR.into(),
        build_dir: BUILD_DIR.into(),
        ..BuildOptions::default()
    }
}

/// Parse a fixture build file as `/build/build.ninja`.
pub fn parse_fixture(tree: &MockSourceTree, content: &str) -> ParsedNinja {
    let options = ParseOptions::new(ROOT_DIR, "");
    let imports = ImportIndex::new();
    NinjaParser::new(tree, &options, &imports)
        .parse_str(content, Path::new("/build/build.ninja"))
        .expect("fixture parses")
}
