//! Stand-ins for the kadmin and ktutil shells
//!
//! The fake realm keeps one file per principal holding its key version under `db/`. Fake keytabs
//! are text files with one `KEYTAB <principal> <kvno> <enctype>` line per key. Every invocation is
//! appended to `calls.log`.
#![allow(dead_code)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use anyhow::Result;
use kadmin_keytab::KAdmin;
use tempfile::TempDir;

pub const REALM: &str = "EXAMPLE.COM";

const STATE_DIR: &str = "__STATE_DIR__";

const KADMIN: &str = r#"#!/bin/sh
D='__STATE_DIR__'
REALM=EXAMPLE.COM
query=
while [ $# -gt 0 ]; do
  case "$1" in
    -q) query="$2"; shift 2 ;;
    -r|-p|-t|-c|-s) shift 2 ;;
    *) shift ;;
  esac
done
cat > "$D/stdin"
echo "kadmin $query" >> "$D/calls.log"

full() { case "$1" in *@*) echo "$1" ;; *) echo "$1@$REALM" ;; esac; }
entry() { echo "$D/db/$(echo "$1" | tr '/' '$')"; }

set -f
set -- $query
verb="$1"
shift
case "$verb" in
  addprinc|modprinc)
    eval "name=\${$#}"
    p=$(full "$name")
    f=$(entry "$p")
    echo "$*" > "$D/options"
    if [ "$verb" = addprinc ]; then
      echo "WARNING: no policy specified for $p; defaulting to no policy" >&2
      if [ -e "$f" ]; then
        echo "add_principal: Principal or policy already exists while creating \"$p\"." >&2
        exit 1
      fi
      echo 1 > "$f"
      echo "Principal \"$p\" created."
    else
      if [ ! -e "$f" ]; then
        echo "modify_principal: Principal does not exist while getting \"$p\"." >&2
        exit 1
      fi
      echo "Principal \"$p\" modified."
    fi
    ;;
  getprinc)
    eval "name=\${$#}"
    p=$(full "$name")
    f=$(entry "$p")
    if [ ! -e "$f" ]; then
      echo "get_principal: Principal does not exist while retrieving \"$p\"." >&2
      exit 1
    fi
    printf '"%s"\t0\t1411876750\t0\t36000\t"admin/admin@%s"\t1411876750\t128\t%s\t1\t[none]\t604800\t0\t0\t0\t2\t1\n' \
      "$p" "$REALM" "$(cat "$f")"
    ;;
  listprincs)
    pattern="${1:-*}"
    echo "Authenticating as principal admin/admin@$REALM with password."
    case "$pattern" in
      denied*)
        echo "get_principals: Operation requires \`\`list'' privilege while retrieving list." >&2
        exit 0
        ;;
    esac
    set +f
    for f in "$D"/db/*; do
      [ -e "$f" ] || continue
      p=$(basename "$f" | tr '$' '/')
      case "$p" in
        $pattern) echo "$p" ;;
      esac
    done
    ;;
  ktadd)
    kt=
    norandkey=
    glob=
    while [ $# -gt 1 ]; do
      case "$1" in
        -k) kt="$2"; shift 2 ;;
        -norandkey) norandkey=1; shift ;;
        -glob) glob=1; shift ;;
        *) shift ;;
      esac
    done
    extract() {
      f=$(entry "$1")
      kvno=$(cat "$f")
      if [ -z "$norandkey" ]; then
        kvno=$((kvno + 1))
        echo "$kvno" > "$f"
      fi
      for enctype in aes256-cts-hmac-sha1-96 aes128-cts-hmac-sha1-96; do
        echo "KEYTAB $1 $kvno $enctype" >> "$kt"
        echo "Entry for principal $1 with kvno $kvno, encryption type $enctype added to keytab WRFILE:$kt."
      done
    }
    if [ -n "$glob" ]; then
      pattern="$1"
      set +f
      for f in "$D"/db/*; do
        [ -e "$f" ] || continue
        p=$(basename "$f" | tr '$' '/')
        case "$p" in
          $pattern) extract "$p" ;;
        esac
      done
      exit 0
    fi
    p=$(full "$1")
    if [ ! -e "$(entry "$p")" ]; then
      echo "kadmin: Principal $1 does not exist." >&2
      exit 1
    fi
    extract "$p"
    ;;
  ktremove)
    kt=/etc/krb5.keytab
    if [ "$1" = -k ]; then
      kt="$2"
      shift 2
    fi
    p=$(full "$1")
    n=$(grep -cF "KEYTAB $p " "$kt" 2>/dev/null)
    if [ "${n:-0}" -eq 0 ]; then
      echo "kadmin: No entry for principal $p exists in keytab WRFILE:$kt" >&2
      exit 0
    fi
    grep -vF "KEYTAB $p " "$kt" > "$kt.new"
    mv "$kt.new" "$kt"
    i=0
    while [ "$i" -lt "$n" ]; do
      echo "Entry for principal $p with kvno $2 removed from keytab WRFILE:$kt."
      i=$((i + 1))
    done
    ;;
  *)
    echo "kadmin: Unknown request \"$verb\".  Type \"?\" for a request list." >&2
    exit 1
    ;;
esac
"#;

const KTUTIL: &str = r#"#!/bin/sh
D='__STATE_DIR__'
echo "ktutil" >> "$D/calls.log"
buf="$D/ktutil.buf.$$"
: > "$buf"
trap 'rm -f "$buf"' EXIT
while printf 'ktutil:  ' && read -r cmd arg; do
  echo "$cmd $arg" >> "$D/ktutil.log"
  case "$cmd" in
    read_kt|rkt)
      if grep -q '^KEYTAB ' "$arg" 2>/dev/null; then
        cat "$arg" >> "$buf"
      else
        echo "read_kt: Unsupported key table format version number while reading keytab \"$arg\"" >&2
      fi
      ;;
    write_kt|wkt)
      cat "$buf" > "$arg"
      ;;
    quit|q)
      exit 0
      ;;
    *)
      echo "ktutil: Unknown request \"$cmd\".  Type \"?\" for a request list." >&2
      ;;
  esac
done
"#;

const SLOW: &str = "#!/bin/sh\nexec sleep 30\n";

/// Takes one command and leaves
const KTUTIL_EARLY_EXIT: &str = "#!/bin/sh\nprintf 'ktutil:  '\nread -r cmd\nexit 0\n";

/// Prompts once and never reads anything
const KTUTIL_HANG: &str = r#"#!/bin/sh
echo $$ > '__STATE_DIR__/hang.pid'
printf 'ktutil:  '
exec sleep 30
"#;

/// A throwaway realm backed by fake tools
pub struct FakeRealm {
    tmpdir: TempDir,
}

impl FakeRealm {
    pub fn new() -> Result<Self> {
        let tmpdir = tempfile::Builder::new().prefix("fakerealm").tempdir()?;
        let realm = Self { tmpdir };
        fs::create_dir(realm.path().join("db"))?;
        fs::create_dir(realm.keytab_root())?;
        realm.install("kadmin", KADMIN)?;
        realm.install("ktutil", KTUTIL)?;
        realm.install("slow", SLOW)?;
        realm.install("ktutil-early-exit", KTUTIL_EARLY_EXIT)?;
        realm.install("ktutil-hang", KTUTIL_HANG)?;
        Ok(realm)
    }

    fn install(&self, name: &str, script: &str) -> Result<()> {
        let state_dir = self
            .path()
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("non UTF-8 temporary directory"))?;
        let path = self.bin(name);
        fs::write(&path, script.replace(STATE_DIR, state_dir))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        self.tmpdir.path()
    }

    pub fn bin(&self, name: &str) -> PathBuf {
        self.path().join(format!("{name}.sh"))
    }

    pub fn keytab_root(&self) -> PathBuf {
        self.path().join("keytabs")
    }

    /// kadmin.local against the fake database
    pub fn kadmin_local(&self) -> Result<KAdmin> {
        Ok(KAdmin::builder()
            .local()
            .local_bin(self.bin("kadmin"))
            .build()?)
    }

    /// kadmin authenticating with a password
    pub fn kadmin_password(&self, password: &str) -> Result<KAdmin> {
        Ok(KAdmin::builder()
            .bin(self.bin("kadmin"))
            .realm(REALM)
            .principal(&format!("admin/admin@{REALM}"))
            .password(password)
            .build()?)
    }

    /// Create a principal behind the tools' back
    pub fn create_principal(&self, name: &str, kvno: u32) -> Result<()> {
        fs::write(self.entry(name), format!("{kvno}\n"))?;
        Ok(())
    }

    pub fn kvno(&self, name: &str) -> Result<u32> {
        Ok(fs::read_to_string(self.entry(name))?.trim().parse()?)
    }

    fn entry(&self, name: &str) -> PathBuf {
        self.path().join("db").join(name.replace('/', "$"))
    }

    /// Every tool invocation so far
    pub fn calls(&self) -> Result<Vec<String>> {
        read_lines(&self.path().join("calls.log"))
    }

    /// Commands ktutil received so far
    pub fn ktutil_commands(&self) -> Result<Vec<String>> {
        read_lines(&self.path().join("ktutil.log"))
    }

    /// Process ID of the last hanging ktutil
    pub fn hung_pid(&self) -> Result<u32> {
        Ok(fs::read_to_string(self.path().join("hang.pid"))?.trim().parse()?)
    }

    /// What the last kadmin invocation read on its standard input
    pub fn last_stdin(&self) -> Result<String> {
        Ok(fs::read_to_string(self.path().join("stdin"))?)
    }

    /// Options of the last addprinc or modprinc query
    pub fn last_options(&self) -> Result<String> {
        Ok(fs::read_to_string(self.path().join("options"))?
            .trim_end()
            .to_owned())
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(fs::read_to_string(path)?
        .lines()
        .map(String::from)
        .collect())
}
